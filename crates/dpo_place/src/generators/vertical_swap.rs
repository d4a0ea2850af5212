//! Vertical swap: nudges cells one row toward their optimal region.

use super::range::{optimal_region, MAX_REGION_NET_PINS};
use super::{converged, GeneratorArgs, GeneratorStats, MoveGenerator, PassReport};
use crate::context::LegalizationContext;
use crate::engine::MoveEngine;
use crate::ids::{CellId, RowId};
use crate::objective::{journal_hpwl_delta, total_hpwl};
use dpo_common::DpoResult;
use dpo_config::PassConfig;
use tracing::info;

/// Vertical swap generator.
pub struct VerticalSwap {
    config: PassConfig,
    stats: GeneratorStats,
}

impl VerticalSwap {
    /// Creates a generator with the given pass settings.
    pub fn new(config: PassConfig) -> Self {
        Self {
            config,
            stats: GeneratorStats::default(),
        }
    }

    /// Row above or below the cell, toward its optimal region.
    fn target_row(&self, engine: &MoveEngine<'_>, cell: CellId) -> Option<RowId> {
        let p = engine.placement();
        let region = optimal_region(engine.netlist(), engine.arch(), p, cell, MAX_REGION_NET_PINS)?;
        let row = engine.arch().row_at_bottom(p.bottom(cell))?.index();
        let cy = p.center_y(cell);
        let next = if cy < region.ymin {
            row + 1
        } else if cy > region.ymax {
            row.checked_sub(1)?
        } else {
            return None;
        };
        (next < engine.arch().num_rows()).then(|| RowId::from_index(next))
    }

    fn pass(&mut self, engine: &mut MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<i64> {
        engine.resort_segments();
        let mut cells = engine.single_height_cells().to_vec();
        ctx.shuffle(&mut cells);
        for cell in cells {
            if !self.generate(engine, ctx, cell)? {
                continue;
            }
            let delta = journal_hpwl_delta(engine.netlist(), engine.placement(), engine.journal());
            if delta >= 0 {
                engine.commit();
                self.stats.accepted += 1;
            } else {
                engine.rollback()?;
            }
        }
        Ok(total_hpwl(engine.netlist(), engine.placement()))
    }
}

impl MoveGenerator for VerticalSwap {
    fn name(&self) -> &'static str {
        "vs"
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
        if engine.segment_of(cell).is_none() {
            return Ok(false);
        }
        let Some(row) = self.target_row(engine, cell) else {
            return Ok(false);
        };
        let x = engine.placement().left(cell);
        let Some(seg) = engine.segments().find(row, x, engine.cell(cell).region) else {
            return Ok(false);
        };
        let y = engine.arch().row(row).bottom;
        if engine.propose_move(ctx, cell, x, y, seg)? {
            self.stats.moves += 1;
            return Ok(true);
        }
        if engine.propose_swap(ctx, cell, x, y, seg)? {
            self.stats.swaps += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn run(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        args: &GeneratorArgs,
    ) -> DpoResult<PassReport> {
        let passes = args.passes_or(self.config.passes);
        let tolerance = args.tolerance_or(self.config.tolerance);
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
            improvement = report.improvement,
            stats = %self.stats,
            "vertical swap finished"
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
    use crate::engine::test_support::make_engine;

    /// `m` sits in row 0 but connects to two fixed cells in row 2.
    fn make_design() -> Design {
        let mut nl = Netlist::new();
        let m = nl.add_cell(Cell::new("m", 20, 100).at(300, 0));
        let a = nl.add_cell(Cell::new("a", 20, 100).at(200, 200).fixed());
        let b = nl.add_cell(Cell::new("b", 20, 100).at(400, 200).fixed());
        let n0 = nl.add_net("n0");
        nl.connect(m, n0, 0, 0);
        nl.connect(a, n0, 0, 0);
        let n1 = nl.add_net("n1");
        nl.connect(m, n1, 0, 0);
        nl.connect(b, n1, 0, 0);
        Design::new(Architecture::uniform(3, 100, 100, 10), nl)
    }

    #[test]
    fn cell_climbs_toward_its_nets() {
        let design = make_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(1, &design.arch);
        let mut vs = VerticalSwap::new(PassConfig::default());
        let report = vs.run(&mut engine, &mut ctx, &GeneratorArgs::parse_tokens(["-p", "2"]).unwrap()).unwrap();
        assert_eq!(engine.placement().bottom(CellId::from_raw(0)), 200);
        assert_eq!(engine.placement().left(CellId::from_raw(0)), 300);
        assert!(report.final_objective < report.initial);
        assert_eq!(report.stats.accepted, 2);
        engine.check_consistency().unwrap();
    }

    #[test]
    fn cell_inside_region_stays() {
        let design = make_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(1, &design.arch);
        let mut vs = VerticalSwap::new(PassConfig::default());
        vs.run(&mut engine, &mut ctx, &GeneratorArgs::parse_tokens(["-p", "3"]).unwrap()).unwrap();
        let settled = engine.placement().clone();
        let mut vs = VerticalSwap::new(PassConfig::default());
        let report = vs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
        assert_eq!(engine.placement(), &settled);
        assert_eq!(report.stats.accepted, 0);
    }
}
