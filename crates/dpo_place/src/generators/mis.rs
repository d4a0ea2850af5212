//! Independent-set matching.
//!
//! Cells that share no net can be relocated independently, so the HPWL of
//! each one at each candidate spot is exact. A problem is a set of
//! interchangeable cells (same color, size, region and rails) gathered from
//! nearby buckets of a coarse grid; their current positions form the spots.
//! A min-cost assignment of cells to spots is applied when it is perfect and
//! strictly cheaper than the current arrangement.
//!
//! In displacement mode the cost is the distance from each cell's original
//! position and the coloring requirement is dropped.

use super::flow::FlowNetwork;
use super::{converged, GeneratorArgs, GeneratorStats, MoveGenerator, PassReport};
use crate::context::LegalizationContext;
use crate::db::PowerRail;
use crate::engine::MoveEngine;
use crate::ids::{CellId, RegionId, SegmentId};
use crate::objective::{cell_hpwl_at, displacement, total_hpwl};
use dpo_common::DpoResult;
use dpo_config::{MisConfig, MisObjective};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Average cells per grid bucket.
const CELLS_PER_BUCKET: f64 = 200.0;

/// Cells with equal keys may trade places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GroupKey {
    color: usize,
    width: i64,
    height: i64,
    region: RegionId,
    bottom_power: PowerRail,
    top_power: PowerRail,
}

/// A position a cell may be assigned to.
#[derive(Debug, Clone, Copy)]
struct Spot {
    left: i64,
    bottom: i64,
    seg: SegmentId,
}

/// Independent-set matching generator.
pub struct IndependentSetMatching {
    config: MisConfig,
    stats: GeneratorStats,
    objective: MisObjective,
    colors: Vec<usize>,
    times_used: Vec<usize>,
    buckets: HashMap<(i64, i64), Vec<CellId>>,
    origin: (i64, i64),
    step: (i64, i64),
    dims: (i64, i64),
}

impl IndependentSetMatching {
    /// Creates a generator with the given settings.
    pub fn new(config: MisConfig) -> Self {
        let objective = config.objective;
        Self {
            config,
            stats: GeneratorStats::default(),
            objective,
            colors: Vec::new(),
            times_used: Vec::new(),
            buckets: HashMap::new(),
            origin: (0, 0),
            step: (1, 1),
            dims: (1, 1),
        }
    }

    /// Number of colors used by the last coloring.
    pub fn color_count(&self) -> usize {
        self.colors.iter().max().map_or(0, |&c| c + 1)
    }

    /// Greedy coloring of the cell conflict graph: two cells conflict if
    /// they share a net with between two and `skip_nets_larger_than` pins.
    fn color_cells(&mut self, engine: &MoveEngine<'_>) {
        let netlist = engine.netlist();
        let mut graph: UnGraph<CellId, ()> = UnGraph::with_capacity(netlist.cell_count(), 0);
        for cell in netlist.cell_ids() {
            graph.add_node(cell);
        }
        for net in &netlist.nets {
            let n = net.pins.len();
            if n < 2 || n > self.config.skip_nets_larger_than {
                continue;
            }
            let mut cells: Vec<CellId> = net.pins.iter().map(|&p| netlist.pin(p).cell).collect();
            cells.sort_unstable();
            cells.dedup();
            for (i, &a) in cells.iter().enumerate() {
                for &b in &cells[i + 1..] {
                    graph.add_edge(NodeIndex::new(a.index()), NodeIndex::new(b.index()), ());
                }
            }
        }

        let mut colors = vec![usize::MAX; graph.node_count()];
        let mut taken: Vec<bool> = Vec::new();
        for node in graph.node_indices() {
            taken.clear();
            for nb in graph.neighbors(node) {
                let c = colors[nb.index()];
                if c != usize::MAX {
                    if c >= taken.len() {
                        taken.resize(c + 1, false);
                    }
                    taken[c] = true;
                }
            }
            colors[node.index()] = taken.iter().position(|&t| !t).unwrap_or(taken.len());
        }
        self.colors = colors;
    }

    fn key(&self, engine: &MoveEngine<'_>, cell: CellId) -> GroupKey {
        let c = engine.cell(cell);
        let color = match self.objective {
            MisObjective::Wirelength => self.colors.get(cell.index()).copied().unwrap_or(0),
            MisObjective::Displacement => 0,
        };
        GroupKey {
            color,
            width: c.width,
            height: c.height,
            region: c.region,
            bottom_power: c.bottom_power,
            top_power: c.top_power,
        }
    }

    fn bucket_of(&self, engine: &MoveEngine<'_>, cell: CellId) -> (i64, i64) {
        let p = engine.placement();
        let col = (p.center_x(cell) - self.origin.0).div_euclid(self.step.0);
        let row = (p.center_y(cell) - self.origin.1).div_euclid(self.step.1);
        (col.clamp(0, self.dims.0 - 1), row.clamp(0, self.dims.1 - 1))
    }

    /// Buckets candidate cells into a grid sized to hold about
    /// [`CELLS_PER_BUCKET`] average cells per bucket.
    fn build_buckets(&mut self, engine: &MoveEngine<'_>) {
        self.buckets.clear();
        let cells = engine.single_height_cells();
        if cells.is_empty() {
            return;
        }
        let n = cells.len() as f64;
        let p = engine.placement();
        let avg_w = cells.iter().map(|&c| p.width(c) as f64).sum::<f64>() / n;
        let avg_h = cells.iter().map(|&c| p.height(c) as f64).sum::<f64>() / n;
        let scale = CELLS_PER_BUCKET.sqrt();
        self.step = (
            ((avg_w * scale).ceil() as i64).max(1),
            ((avg_h * scale).ceil() as i64).max(1),
        );
        let bounds = engine.arch().bounds;
        self.origin = (bounds.xmin, bounds.ymin);
        self.dims = (
            ((bounds.width() + self.step.0 - 1) / self.step.0).max(1),
            ((bounds.height() + self.step.1 - 1) / self.step.1).max(1),
        );
        for &cell in cells {
            let key = self.bucket_of(engine, cell);
            self.buckets.entry(key).or_default().push(cell);
        }
    }

    /// Gathers cells interchangeable with `seed`, nearest buckets first.
    fn gather(&self, engine: &MoveEngine<'_>, seed: CellId) -> Vec<CellId> {
        let key = self.key(engine, seed);
        let limit = self.config.max_problem_size.max(2);
        let mut found = vec![seed];
        let start = self.bucket_of(engine, seed);
        let mut seen: HashSet<(i64, i64)> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(b) = queue.pop_front() {
            for &c in self.buckets.get(&b).map_or(&[][..], |v| v.as_slice()) {
                if found.len() >= limit {
                    return found;
                }
                if c == seed
                    || self.times_used[c.index()] >= self.config.max_times_used
                    || engine.segment_of(c).is_none()
                    || self.key(engine, c) != key
                {
                    continue;
                }
                found.push(c);
            }
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let nb = (b.0 + dx, b.1 + dy);
                let inside = (0..self.dims.0).contains(&nb.0) && (0..self.dims.1).contains(&nb.1);
                if inside && seen.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        found
    }

    /// Cost of `cell` sitting at `spot`.
    fn cost(&self, engine: &MoveEngine<'_>, cell: CellId, spot: &Spot) -> i64 {
        match self.objective {
            MisObjective::Wirelength => {
                cell_hpwl_at(engine.netlist(), engine.placement(), cell, spot.left, spot.bottom)
            }
            MisObjective::Displacement => {
                let orig = engine.original_placement();
                (spot.left - orig.left(cell)).abs() + (spot.bottom - orig.bottom(cell)).abs()
            }
        }
    }

    /// Returns `true` if the displacement limits let `cell` sit at `spot`.
    fn reachable(engine: &MoveEngine<'_>, ctx: &LegalizationContext, cell: CellId, spot: &Spot) -> bool {
        let orig = engine.original_placement();
        ctx.limits()
            .allows(spot.left - orig.left(cell), spot.bottom - orig.bottom(cell))
    }

    fn objective_value(&self, engine: &MoveEngine<'_>) -> i64 {
        match self.objective {
            MisObjective::Wirelength => total_hpwl(engine.netlist(), engine.placement()),
            MisObjective::Displacement => {
                displacement(engine.netlist(), engine.original_placement(), engine.placement()).total
            }
        }
    }

    fn pass(&mut self, engine: &mut MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<i64> {
        engine.resort_segments();
        self.build_buckets(engine);
        self.times_used = vec![0; engine.netlist().cell_count()];
        let mut cells = engine.single_height_cells().to_vec();
        ctx.shuffle(&mut cells);
        for cell in cells {
            if self.times_used[cell.index()] >= self.config.max_times_used {
                continue;
            }
            if self.generate(engine, ctx, cell)? {
                engine.commit();
                self.stats.accepted += 1;
            }
        }
        Ok(self.objective_value(engine))
    }
}

impl MoveGenerator for IndependentSetMatching {
    fn name(&self) -> &'static str {
        "mis"
    }

    fn init(&mut self, engine: &MoveEngine<'_>, _ctx: &mut LegalizationContext) -> DpoResult<()> {
        match self.objective {
            MisObjective::Wirelength => self.color_cells(engine),
            MisObjective::Displacement => self.colors = vec![0; engine.netlist().cell_count()],
        }
        self.times_used = vec![0; engine.netlist().cell_count()];
        debug!(colors = self.color_count(), "independent sets colored");
        Ok(())
    }

    fn generate(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        cell: CellId,
    ) -> DpoResult<bool> {
        self.stats.attempts += 1;
        if engine.segment_of(cell).is_none() || self.times_used.len() <= cell.index() {
            return Ok(false);
        }
        let cells = self.gather(engine, cell);
        if cells.len() < 2 {
            return Ok(false);
        }
        for &c in &cells {
            self.times_used[c.index()] += 1;
        }

        let p = engine.placement();
        let mut spots = Vec::with_capacity(cells.len());
        for &c in &cells {
            let Some(seg) = engine.segment_of(c) else {
                return Ok(false);
            };
            spots.push(Spot {
                left: p.left(c),
                bottom: p.bottom(c),
                seg,
            });
        }

        // source, cells, spots, sink
        let n = cells.len();
        let (source, sink) = (0, 2 * n + 1);
        let mut net = FlowNetwork::new(2 * n + 2);
        let mut current = 0;
        let mut arcs: Vec<(usize, usize, usize)> = Vec::new();
        for (i, &c) in cells.iter().enumerate() {
            net.add_edge(source, 1 + i, 1, 0);
            net.add_edge(1 + n + i, sink, 1, 0);
            current += self.cost(engine, c, &spots[i]);
            for (j, spot) in spots.iter().enumerate() {
                if i == j || Self::reachable(engine, ctx, c, spot) {
                    let cost = self.cost(engine, c, spot);
                    arcs.push((i, j, net.add_edge(1 + i, 1 + n + j, 1, cost)));
                }
            }
        }
        let result = net.min_cost_flow(source, sink, n as i64);
        if result.flow < n as i64 || result.cost >= current {
            return Ok(false);
        }

        let mut moved = 0;
        for &(i, j, arc) in &arcs {
            if i == j || net.flow(arc) == 0 {
                continue;
            }
            let spot = spots[j];
            if !engine.stage_move(ctx, cells[i], spot.left, spot.bottom, &[spot.seg])? {
                engine.rollback()?;
                return Ok(false);
            }
            moved += 1;
        }
        if moved == 0 || !engine.verify_move()? {
            return Ok(false);
        }
        self.stats.moves += moved;
        Ok(true)
    }

    fn run(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        args: &GeneratorArgs,
    ) -> DpoResult<PassReport> {
        let passes = args.passes_or(self.config.passes);
        let tolerance = args.tolerance_or(self.config.tolerance);
        self.objective = if args.displacement {
            MisObjective::Displacement
        } else {
            self.config.objective
        };
        self.stats = GeneratorStats::default();
        self.init(engine, ctx)?;

        let initial = self.objective_value(engine);
        let mut curr = initial;
        let mut run = 0;
        for _ in 0..passes {
            let last = curr;
            curr = self.pass(engine, ctx)?;
            run += 1;
            if converged(last, curr, tolerance) {
                break;
            }
        }
        let report = PassReport::new(self.name(), initial, curr, run, self.stats);
        info!(
            objective = ?self.objective,
            initial,
            final_objective = curr,
            improvement = report.improvement,
            stats = %self.stats,
            "independent-set matching finished"
        );
        Ok(report)
    }

    fn stats(&self) -> GeneratorStats {
        self.stats
    }
}
