//! Min-cost flow over a small residual network.
//!
//! Successive shortest paths, each found with a queue-based Bellman-Ford
//! search so negative residual costs are handled without potentials.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    cap: i64,
    cost: i64,
}

/// A directed network with integer capacities and costs.
///
/// Every edge is stored next to its reverse residual edge, so edge `e` and
/// `e ^ 1` form a pair.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    edges: Vec<Edge>,
    adj: Vec<Vec<usize>>,
    initial_cap: Vec<i64>,
}

/// Result of a min-cost flow computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinCostFlow {
    /// Units of flow pushed from source to sink.
    pub flow: i64,
    /// Total cost of the pushed flow.
    pub cost: i64,
}

impl FlowNetwork {
    /// Creates a network with `nodes` nodes and no edges.
    pub fn new(nodes: usize) -> Self {
        Self {
            edges: Vec::new(),
            adj: vec![Vec::new(); nodes],
            initial_cap: Vec::new(),
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    /// Adds an edge and returns its handle.
    pub fn add_edge(&mut self, from: usize, to: usize, cap: i64, cost: i64) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge { to, cap, cost });
        self.edges.push(Edge {
            to: from,
            cap: 0,
            cost: -cost,
        });
        self.initial_cap.push(cap);
        self.initial_cap.push(0);
        self.adj[from].push(id);
        self.adj[to].push(id + 1);
        id
    }

    /// Flow currently carried by the edge `add_edge` returned.
    pub fn flow(&self, edge: usize) -> i64 {
        self.initial_cap[edge] - self.edges[edge].cap
    }

    /// Pushes up to `limit` units from `source` to `sink` at minimum cost.
    pub fn min_cost_flow(&mut self, source: usize, sink: usize, limit: i64) -> MinCostFlow {
        let n = self.node_count();
        let mut result = MinCostFlow { flow: 0, cost: 0 };
        while result.flow < limit {
            let mut dist = vec![i64::MAX; n];
            let mut via: Vec<Option<usize>> = vec![None; n];
            let mut queued = vec![false; n];
            let mut queue = VecDeque::new();
            dist[source] = 0;
            queue.push_back(source);
            queued[source] = true;
            while let Some(u) = queue.pop_front() {
                queued[u] = false;
                for &e in &self.adj[u] {
                    let edge = &self.edges[e];
                    if edge.cap <= 0 {
                        continue;
                    }
                    let nd = dist[u] + edge.cost;
                    if nd < dist[edge.to] {
                        dist[edge.to] = nd;
                        via[edge.to] = Some(e);
                        if !queued[edge.to] {
                            queued[edge.to] = true;
                            queue.push_back(edge.to);
                        }
                    }
                }
            }
            if dist[sink] == i64::MAX {
                break;
            }

            // Bottleneck along the path, then augment.
            let mut push = limit - result.flow;
            let mut v = sink;
            while let Some(e) = via[v] {
                push = push.min(self.edges[e].cap);
                v = self.edges[e ^ 1].to;
            }
            let mut v = sink;
            while let Some(e) = via[v] {
                self.edges[e].cap -= push;
                self.edges[e ^ 1].cap += push;
                v = self.edges[e ^ 1].to;
            }
            result.flow += push;
            result.cost += push * dist[sink];
        }
        result
    }
}
