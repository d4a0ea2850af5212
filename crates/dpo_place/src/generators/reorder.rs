//! Window reordering.
//!
//! Slides a window of consecutive single-height cells along every segment
//! and tries every ordering of the window. Each ordering is repacked inside
//! the window's free interval with the spare sites spread evenly over the
//! gaps, and the ordering with the shortest connected wirelength wins if it
//! beats the current arrangement.

use super::{converged, GeneratorArgs, GeneratorStats, MoveGenerator, PassReport};
use crate::context::LegalizationContext;
use crate::engine::MoveEngine;
use crate::ids::{CellId, SegmentId};
use crate::objective::{journal_hpwl_delta, nets_hpwl_with, nets_of_cells, total_hpwl};
use dpo_common::DpoResult;
use dpo_config::ReorderConfig;
use itertools::Itertools;
use tracing::info;

/// Window reorder generator.
pub struct WindowReorder {
    config: ReorderConfig,
    stats: GeneratorStats,
    window: usize,
}

impl WindowReorder {
    /// Creates a generator with the given settings.
    pub fn new(config: ReorderConfig) -> Self {
        let window = config.window.clamp(2, 4);
        Self {
            config,
            stats: GeneratorStats::default(),
            window,
        }
    }

    /// The window starting at `cell` in its segment, or `None` if it would
    /// hold fewer than two cells or a multi-height cell.
    fn window_at(&self, engine: &MoveEngine<'_>, cell: CellId) -> Option<(SegmentId, usize, Vec<CellId>)> {
        let seg = engine.segment_of(cell)?;
        let list = engine.index().cells(seg);
        let start = engine.index().position(seg, cell)?;
        let end = (start + self.window).min(list.len());
        if end - start < 2 {
            return None;
        }
        let cells = list[start..end].to_vec();
        cells.iter().all(|&c| engine.span(c) == 1).then_some((seg, start, cells))
    }

    /// Left edges for `order` packed into `[left, right]` with the spare
    /// sites distributed evenly, or `None` if the cells do not fit.
    fn repack(
        engine: &MoveEngine<'_>,
        seg: SegmentId,
        order: &[CellId],
        prev: Option<CellId>,
        next: Option<CellId>,
        left: i64,
        right: i64,
    ) -> Option<Vec<i64>> {
        let (first, last) = (*order.first()?, *order.last()?);
        let row = engine.arch().row(engine.segments().get(seg).row);
        let sp = row.site_spacing;
        let lx = left + engine.spacing(prev, Some(first));
        let rx = right - engine.spacing(Some(last), next);
        let first_site = (lx - row.origin_x + sp - 1).div_euclid(sp);
        let end_site = (rx - row.origin_x).div_euclid(sp);

        let p = engine.placement();
        let sites: Vec<i64> = order
            .iter()
            .enumerate()
            .map(|(k, &c)| {
                let gap = order.get(k + 1).map_or(0, |&n| engine.spacing(Some(c), Some(n)));
                (p.width(c) + gap + sp - 1) / sp
            })
            .collect();
        let free = end_site - first_site - sites.iter().sum::<i64>();
        if free < 0 {
            return None;
        }

        let slots = order.len() as i64 + 1;
        let mut site = first_site;
        let mut xs = Vec::with_capacity(order.len());
        for (k, w) in sites.iter().enumerate() {
            let k = k as i64;
            site += free * (k + 1) / slots - free * k / slots;
            xs.push(row.origin_x + site * sp);
            site += w;
        }
        Some(xs)
    }

    fn pass(&mut self, engine: &mut MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<i64> {
        engine.resort_segments();
        for s in 0..engine.segments().len() {
            let seg = SegmentId::from_index(s);
            let mut i = 0;
            loop {
                let Some(&cell) = engine.index().cells(seg).get(i) else {
                    break;
                };
                if self.generate(engine, ctx, cell)? {
                    if journal_hpwl_delta(engine.netlist(), engine.placement(), engine.journal()) > 0 {
                        engine.commit();
                        self.stats.accepted += 1;
                    } else {
                        engine.rollback()?;
                    }
                }
                i += 1;
            }
        }
        Ok(total_hpwl(engine.netlist(), engine.placement()))
    }
}

impl MoveGenerator for WindowReorder {
    fn name(&self) -> &'static str {
        "ro"
    }

    fn init(&mut self, _engine: &MoveEngine<'_>, _ctx: &mut LegalizationContext) -> DpoResult<()> {
        Ok(())
    }

    fn generate(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        cell: CellId,
    ) -> DpoResult<bool> {
        self.stats.attempts += 1;
        let Some((seg, start, cells)) = self.window_at(engine, cell) else {
            return Ok(false);
        };
        let s = *engine.segments().get(seg);
        let list = engine.index().cells(seg);
        let prev = start.checked_sub(1).map(|k| list[k]);
        let next = list.get(start + cells.len()).copied();
        let p = engine.placement();
        let left = prev.map_or(s.xmin, |c| p.right(c));
        let right = next.map_or(s.xmax, |c| p.left(c));
        let y = p.bottom(cell);

        let netlist = engine.netlist();
        let nets = nets_of_cells(netlist, &cells);
        let mut best_cost = nets_hpwl_with(netlist, p, &nets, &[]);
        let mut best: Option<Vec<(CellId, i64, i64)>> = None;
        let limits = ctx.limits();
        let orig = engine.original_placement();

        for order in cells.iter().copied().permutations(cells.len()) {
            let Some(xs) = Self::repack(engine, seg, &order, prev, next, left, right) else {
                continue;
            };
            let placed: Vec<(CellId, i64, i64)> = order.iter().zip(&xs).map(|(&c, &x)| (c, x, y)).collect();
            if !placed
                .iter()
                .all(|&(c, x, y)| limits.allows(x - orig.left(c), y - orig.bottom(c)))
            {
                continue;
            }
            let cost = nets_hpwl_with(netlist, p, &nets, &placed);
            if cost < best_cost {
                best_cost = cost;
                best = Some(placed);
            }
        }
        let Some(placed) = best else {
            return Ok(false);
        };

        for (c, x, y) in placed {
            if !engine.stage_move(ctx, c, x, y, &[seg])? {
                engine.rollback()?;
                return Ok(false);
            }
        }
        if !engine.verify_move()? {
            return Ok(false);
        }
        self.stats.moves += 1;
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
        self.window = args.window_or(self.config.window);
        self.stats = GeneratorStats::default();
        self.init(engine, ctx)?;

        let initial = total_hpwl(engine.netlist(), engine.placement());
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
            initial,
            final_hpwl = curr,
            window = self.window,
            improvement = report.improvement,
            stats = %self.stats,
            "window reorder finished"
        );
        Ok(report)
    }

    fn stats(&self) -> GeneratorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Architecture, Cell, Design, Netlist};
    use crate::engine::test_support::{id, make_engine};

    /// `a` and `b` sit side by side in the middle of the row, each wired to
    /// a fixed cell on the far side of the other.
    fn crossed_design() -> Design {
        let mut nl = Netlist::new();
        let a = nl.add_cell(Cell::new("a", 20, 100).at(100, 0));
        let b = nl.add_cell(Cell::new("b", 20, 100).at(120, 0));
        let fl = nl.add_cell(Cell::new("fl", 10, 100).at(0, 0).fixed());
        let fr = nl.add_cell(Cell::new("fr", 10, 100).at(290, 0).fixed());
        let n0 = nl.add_net("n0");
        nl.connect(a, n0, 0, 0);
        nl.connect(fr, n0, 0, 0);
        let n1 = nl.add_net("n1");
        nl.connect(b, n1, 0, 0);
        nl.connect(fl, n1, 0, 0);
        Design::new(Architecture::uniform(1, 100, 30, 10), nl)
    }

    #[test]
    fn improving_order_is_adopted() {
        let design = crossed_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(1, &design.arch);
        let before = total_hpwl(&design.netlist, engine.placement());
        let mut ro = WindowReorder::new(ReorderConfig::default());
        let report = ro.run(&mut engine, &mut ctx, &GeneratorArgs::parse_tokens(["-w", "2"]).unwrap()).unwrap();

        let p = engine.placement();
        assert!(p.left(id(1)) < p.left(id(0)));
        let row = design.arch.row(crate::ids::RowId::from_raw(0));
        assert!(row.is_site_aligned(p.left(id(0))) && row.is_site_aligned(p.left(id(1))));
        assert!(report.final_objective < before);
        assert_eq!(report.stats.accepted, 1);
        engine.check_consistency().unwrap();
    }

    #[test]
    fn no_improving_order_keeps_cells() {
        // Same cells, but each already sits next to its fixed partner.
        let mut nl = Netlist::new();
        let a = nl.add_cell(Cell::new("a", 20, 100).at(20, 0));
        let b = nl.add_cell(Cell::new("b", 20, 100).at(260, 0));
        let fl = nl.add_cell(Cell::new("fl", 10, 100).at(0, 0).fixed());
        let fr = nl.add_cell(Cell::new("fr", 10, 100).at(290, 0).fixed());
        let n0 = nl.add_net("n0");
        nl.connect(a, n0, 0, 0);
        nl.connect(fl, n0, 0, 0);
        let n1 = nl.add_net("n1");
        nl.connect(b, n1, 0, 0);
        nl.connect(fr, n1, 0, 0);
        let design = Design::new(Architecture::uniform(1, 100, 30, 10), nl);

        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(1, &design.arch);
        let before = engine.placement().clone();
        let mut ro = WindowReorder::new(ReorderConfig::default());
        let report = ro.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
        assert_eq!(engine.placement(), &before);
        assert_eq!(report.stats.accepted, 0);
        assert!(engine.journal().is_empty());
    }

    #[test]
    fn repack_spreads_spare_sites() {
        let design = crate::engine::test_support::one_row_design(20, &[(0, 20), (20, 20)]);
        let engine = make_engine(&design);
        let seg = engine.segment_of(id(0)).unwrap();
        // 20 sites, 4 used, 16 spare over 3 gaps: 5, 5, 6.
        let xs = WindowReorder::repack(&engine, seg, &[id(1), id(0)], None, None, 0, 200).unwrap();
        assert_eq!(xs, vec![50, 120]);
        assert!(WindowReorder::repack(&engine, seg, &[id(0), id(1)], None, None, 0, 30).is_none());
    }
}
