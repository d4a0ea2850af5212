//! Budgeted global swap.
//!
//! Each single-height cell is pulled toward the median box of its nets (or,
//! with probability `tradeoff`, to a random spot in its displacement box)
//! by a move or a swap. An invocation has two phases:
//!
//! 1. A profiling phase accepts pure wirelength improvements to learn the
//!    best HPWL reachable from here, then undoes everything it did.
//! 2. A sequence of stages, one per budget multiplier, accepts a proposal
//!    only if the resulting HPWL stays within `multiplier × profiled HPWL`
//!    and the wirelength gain plus the weighted density gain is positive.
//!    The budget never drops below the HPWL the invocation started from.
//!    The first two stages loosen the displacement limits.

use super::range::{segment_at, wirelength_target};
use super::{converged, GeneratorArgs, GeneratorStats, MoveGenerator, PassReport};
use crate::context::{DisplacementLimits, LegalizationContext};
use crate::density::{DensityMap, UtilizationGrid};
use crate::engine::MoveEngine;
use crate::ids::{CellId, SegmentId};
use crate::journal::MoveAction;
use crate::objective::{journal_hpwl_delta, total_hpwl};
use dpo_common::DpoResult;
use dpo_config::GlobalSwapConfig;
use tracing::{debug, info, warn};

/// Random probes per cell when a random move is chosen.
const RANDOM_MOVE_TRIES: usize = 10;

/// Displacement multipliers applied to the first stages.
const STAGE_DISPLACEMENT_SCALE: [i64; 2] = [5, 3];

/// Budget and acceptance record of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    /// HPWL no committed state of the stage may exceed.
    pub budget: i64,
    /// Highest HPWL committed during the stage, if anything was committed.
    pub peak: Option<i64>,
    /// Proposals committed during the stage.
    pub accepted: usize,
}

/// Global swap generator.
pub struct GlobalSwap {
    config: GlobalSwapConfig,
    stats: GeneratorStats,
    tradeoff: f64,
    allow_random: bool,
    weight: f64,
    budget: i64,
    optimal: i64,
    curr_hpwl: i64,
    profiling: bool,
    history: Vec<MoveAction>,
    stages: Vec<StageOutcome>,
    grid: Option<UtilizationGrid>,
    contrib: Vec<f64>,
    since_normalize: usize,
}

impl GlobalSwap {
    /// Creates a generator with the given settings.
    pub fn new(config: GlobalSwapConfig) -> Self {
        let tradeoff = config.tradeoff.clamp(0.0, 1.0);
        Self {
            config,
            stats: GeneratorStats::default(),
            tradeoff,
            allow_random: true,
            weight: 0.0,
            budget: i64::MAX,
            optimal: 0,
            curr_hpwl: 0,
            profiling: false,
            history: Vec::new(),
            stages: Vec::new(),
            grid: None,
            contrib: Vec::new(),
            since_normalize: 0,
        }
    }

    /// Density weight chosen for the last invocation.
    pub fn congestion_weight(&self) -> f64 {
        self.weight
    }

    /// HPWL budget of the last stage run.
    pub fn budget(&self) -> i64 {
        self.budget
    }

    /// Best HPWL reached by the profiling phase of the last invocation.
    pub fn optimal(&self) -> i64 {
        self.optimal
    }

    /// Per-stage outcomes of the last invocation.
    pub fn stages(&self) -> &[StageOutcome] {
        &self.stages
    }

    /// Stage budget: the requested multiple of the profiled HPWL, capped by
    /// the profiling excess and floored at the starting HPWL.
    fn stage_budget(&self, initial: i64, optimal: i64, multiplier: f64) -> i64 {
        let excess = self.config.profiling_excess.max(1.0);
        let requested = (optimal as f64 * multiplier.min(excess).max(1.0)).floor() as i64;
        requested.max(initial)
    }

    /// Moves or swaps `cell` toward `(x, y)` in `seg`.
    fn try_target(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &LegalizationContext,
        cell: CellId,
        x: i64,
        y: i64,
        seg: SegmentId,
    ) -> DpoResult<bool> {
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

    /// Up to [`RANDOM_MOVE_TRIES`] probes inside the displacement box
    /// around the cell's original position.
    fn random_move(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        cell: CellId,
    ) -> DpoResult<bool> {
        if engine.segment_of(cell).is_none() {
            return Ok(false);
        }
        let limits = ctx.limits();
        let bounds = engine.arch().bounds;
        let orig = engine.original_placement();
        let (ox, oy) = (orig.left(cell), orig.bottom(cell));
        let xmin = bounds.xmin.max(ox - limits.max_x);
        let xmax = bounds.xmax.min(ox + limits.max_x);
        let ymin = bounds.ymin.max(oy - limits.max_y);
        let ymax = bounds.ymax.min(oy + limits.max_y);

        for _ in 0..RANDOM_MOVE_TRIES {
            let x = ctx.random_in(xmin, xmax);
            let y = ctx.random_in(ymin, ymax);
            let Some((bottom, seg)) = segment_at(engine, cell, x, y) else {
                continue;
            };
            if self.try_target(engine, ctx, cell, x, bottom, seg)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Weighted density relief of the staged proposal.
    fn congestion_gain(&self, engine: &MoveEngine<'_>) -> f64 {
        let Some(grid) = &self.grid else {
            return 0.0;
        };
        engine
            .journal()
            .actions()
            .iter()
            .map(|a| {
                let before = grid
                    .pixel_at(a.orig_left, a.orig_bottom)
                    .map_or(0.0, |p| grid.density_at(p));
                let after = grid
                    .pixel_at(a.new_left, a.new_bottom)
                    .map_or(0.0, |p| grid.density_at(p));
                let contrib = self.contrib.get(a.cell.index()).copied().unwrap_or(0.0);
                (before - after) * contrib
            })
            .sum()
    }

    /// Commits or rolls back the staged proposal.
    fn evaluate(&mut self, engine: &mut MoveEngine<'_>) -> DpoResult<bool> {
        let delta = journal_hpwl_delta(engine.netlist(), engine.placement(), engine.journal());
        let next = self.curr_hpwl - delta;
        if next > self.budget {
            engine.rollback()?;
            return Ok(false);
        }
        let gain = delta as f64 + self.weight * self.congestion_gain(engine);
        if gain <= 0.0 {
            engine.rollback()?;
            return Ok(false);
        }

        if self.profiling {
            self.history.extend_from_slice(engine.journal().actions());
        } else {
            self.update_grid(engine);
            if let Some(stage) = self.stages.last_mut() {
                stage.peak = Some(stage.peak.map_or(next, |p| p.max(next)));
                stage.accepted += 1;
            }
        }
        engine.commit();
        self.curr_hpwl = next;
        self.stats.accepted += 1;
        Ok(true)
    }

    fn update_grid(&mut self, engine: &MoveEngine<'_>) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        for a in engine.journal().actions() {
            let cell = engine.cell(a.cell);
            grid.update(cell, a.orig_left, a.orig_bottom, false);
            grid.update(cell, a.new_left, a.new_bottom, true);
        }
        self.since_normalize += 1;
        if self.since_normalize >= self.config.normalization_interval.max(1) {
            grid.normalize();
            self.since_normalize = 0;
        }
    }

    /// One pass over every single-height cell in random order.
    fn pass(&mut self, engine: &mut MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<i64> {
        engine.resort_segments();
        let mut cells = engine.single_height_cells().to_vec();
        ctx.shuffle(&mut cells);
        for cell in cells {
            if self.generate(engine, ctx, cell)? {
                self.evaluate(engine)?;
            }
        }
        self.curr_hpwl = total_hpwl(engine.netlist(), engine.placement());
        Ok(self.curr_hpwl)
    }

    /// Runs passes until the pass count is spent or a pass stalls.
    fn passes(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        passes: u32,
        tolerance: f64,
    ) -> DpoResult<u32> {
        let mut run = 0;
        for _ in 0..passes {
            let last = self.curr_hpwl;
            let curr = self.pass(engine, ctx)?;
            run += 1;
            if converged(last, curr, tolerance) {
                break;
            }
        }
        Ok(run)
    }

    /// Measures the HPWL reachable by pure wirelength moves, then restores
    /// the placement and the random number generator.
    fn profile(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        passes: u32,
        tolerance: f64,
    ) -> DpoResult<i64> {
        let rng = ctx.snapshot_rng();
        let saved = self.stats;
        let (tradeoff, allow_random) = (self.tradeoff, self.allow_random);
        self.profiling = true;
        self.weight = 0.0;
        self.tradeoff = 0.0;
        self.allow_random = false;
        self.budget = self.curr_hpwl.saturating_mul(2);
        self.history.clear();

        self.passes(engine, ctx, passes, tolerance)?;
        let optimal = self.curr_hpwl;

        let history = std::mem::take(&mut self.history);
        engine.undo_actions(&history)?;
        engine.resort_segments();
        self.curr_hpwl = total_hpwl(engine.netlist(), engine.placement());
        ctx.restore_rng(rng);
        self.stats = saved;
        self.profiling = false;
        self.tradeoff = tradeoff;
        self.allow_random = allow_random;
        debug!(optimal, undone = history.len(), "profiling finished");
        Ok(optimal)
    }

    /// Samples proposals to balance wirelength against density relief.
    fn calibrate_weight(&mut self, engine: &mut MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<f64> {
        let site = engine.arch().site_width() as f64;
        let cells = engine.single_height_cells().to_vec();
        if cells.len() < 2 {
            return Ok(site);
        }
        let saved = self.stats;
        let mut total_delta = 0.0;
        let mut total_gain = 0.0;
        let mut samples = 0usize;
        for _ in 0..self.config.sampling_moves.min(cells.len()) {
            let cell = cells[ctx.random(cells.len())];
            if !self.generate(engine, ctx, cell)? {
                continue;
            }
            let delta = journal_hpwl_delta(engine.netlist(), engine.placement(), engine.journal());
            total_delta += (delta as f64).abs();
            total_gain += self.congestion_gain(engine).abs();
            samples += 1;
            engine.rollback()?;
        }
        self.stats = saved;

        if samples == 0 {
            warn!("no valid samples for the congestion weight, using one site width");
            return Ok(site);
        }
        let avg_delta = total_delta / samples as f64;
        let avg_gain = total_gain / samples as f64;
        let weight = if avg_gain > 0.0 {
            avg_delta / avg_gain * self.config.user_congestion_weight
        } else {
            0.5 * site
        };
        debug!(avg_delta, avg_gain, samples, weight, "congestion weight calibrated");
        Ok(weight)
    }
}

impl MoveGenerator for GlobalSwap {
    fn name(&self) -> &'static str {
        "gs"
    }

    fn init(&mut self, engine: &MoveEngine<'_>, _ctx: &mut LegalizationContext) -> DpoResult<()> {
        let netlist = engine.netlist();
        let mut grid = UtilizationGrid::new(engine.arch(), self.config.area_weight, self.config.pin_weight);
        grid.compute(netlist, engine.placement());
        self.grid = Some(grid);
        self.contrib = netlist
            .cells
            .iter()
            .map(|c| {
                self.config.area_weight * (c.width * c.height) as f64
                    + self.config.pin_weight * c.pins.len() as f64
            })
            .collect();
        self.since_normalize = 0;
        Ok(())
    }

    fn generate(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        cell: CellId,
    ) -> DpoResult<bool> {
        self.stats.attempts += 1;
        let wirelength_first = ctx.random(1000) as f64 >= self.tradeoff * 1000.0;
        if wirelength_first {
            if let Some((x, y, seg)) = wirelength_target(engine, ctx, cell) {
                if self.try_target(engine, ctx, cell, x, y, seg)? {
                    return Ok(true);
                }
            }
        }
        if !self.allow_random {
            return Ok(false);
        }
        self.random_move(engine, ctx, cell)
    }

    fn run(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        args: &GeneratorArgs,
    ) -> DpoResult<PassReport> {
        let passes = args.passes_or(self.config.passes);
        let tolerance = args.tolerance_or(self.config.tolerance);
        self.tradeoff = args.tradeoff_or(self.config.tradeoff);
        self.allow_random = true;
        self.stats = GeneratorStats::default();
        self.stages.clear();

        engine.resort_segments();
        let initial = total_hpwl(engine.netlist(), engine.placement());
        self.curr_hpwl = initial;
        if initial == 0 {
            info!("global swap skipped: design has no wirelength");
            return Ok(PassReport::new(self.name(), 0, 0, 0, self.stats));
        }
        self.init(engine, ctx)?;

        let optimal = self.profile(engine, ctx, passes, tolerance)?;
        self.optimal = optimal;
        if let Some(grid) = self.grid.as_mut() {
            grid.normalize();
        }
        self.weight = self.calibrate_weight(engine, ctx)?;
        info!(initial, optimal, weight = self.weight, "global swap profiled");

        let saved_limits = ctx.limits();
        let mut run = 0;
        for (stage, &multiplier) in self.config.budget_multipliers.clone().iter().enumerate() {
            let scale = STAGE_DISPLACEMENT_SCALE.get(stage).copied().unwrap_or(1);
            ctx.set_limits(DisplacementLimits {
                max_x: saved_limits.max_x.saturating_mul(scale),
                max_y: saved_limits.max_y.saturating_mul(scale),
            });
            self.budget = self.stage_budget(initial, optimal, multiplier);
            self.stages.push(StageOutcome {
                budget: self.budget,
                peak: None,
                accepted: 0,
            });
            run += self.passes(engine, ctx, passes, tolerance)?;
            debug!(stage, budget = self.budget, hpwl = self.curr_hpwl, "global swap stage done");
        }
        ctx.set_limits(saved_limits);

        let report = PassReport::new(self.name(), initial, self.curr_hpwl, run, self.stats);
        info!(
            initial,
            final_hpwl = report.final_objective,
            improvement = report.improvement,
            stats = %self.stats,
            "global swap finished"
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
    use crate::drc::EdgeSpacingChecker;

    /// Pairs of connected cells placed far apart on a 4-row chip.
    fn make_design() -> Design {
        let mut nl = Netlist::new();
        for i in 0..6i64 {
            let a = nl.add_cell(Cell::new(format!("a{i}"), 20, 100).at(20 + 40 * i, (i % 4) * 100));
            let b = nl.add_cell(Cell::new(format!("b{i}"), 20, 100).at(900 - 40 * i, ((i + 2) % 4) * 100));
            let n = nl.add_net(format!("n{i}"));
            nl.connect(a, n, 0, 0);
            nl.connect(b, n, 0, 0);
        }
        Design::new(Architecture::uniform(4, 100, 100, 10), nl)
    }

    fn make_engine(design: &Design) -> MoveEngine<'_> {
        let mut engine = MoveEngine::new(design, Box::new(EdgeSpacingChecker::default())).unwrap();
        engine.assign_cells_to_segments().unwrap();
        engine
    }

    #[test]
    fn run_never_worsens_and_keeps_index_consistent() {
        let design = make_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(7, &design.arch);
        let before = total_hpwl(&design.netlist, engine.placement());
        let mut gs = GlobalSwap::new(GlobalSwapConfig::default());
        let report = gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
        assert_eq!(report.initial, before);
        assert!(report.final_objective <= gs.budget().max(before));
        assert_eq!(report.final_objective, total_hpwl(&design.netlist, engine.placement()));
        assert!(engine.journal().is_empty());
        engine.check_consistency().unwrap();
    }

    #[test]
    fn stage_limits_are_restored() {
        let design = make_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(3, &design.arch);
        ctx.set_max_displacement(1, 1);
        let limits = ctx.limits();
        let mut gs = GlobalSwap::new(GlobalSwapConfig::default());
        gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
        assert_eq!(ctx.limits(), limits);
    }

    #[test]
    fn same_seed_same_result() {
        let design = make_design();
        let mut results = Vec::new();
        for _ in 0..2 {
            let mut engine = make_engine(&design);
            let mut ctx = LegalizationContext::new(11, &design.arch);
            let mut gs = GlobalSwap::new(GlobalSwapConfig::default());
            gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
            results.push(engine.into_placement());
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn stage_budget_floors_at_initial() {
        let gs = GlobalSwap::new(GlobalSwapConfig {
            profiling_excess: 1.10,
            ..GlobalSwapConfig::default()
        });
        assert_eq!(gs.stage_budget(6285, 1060, 1.10), 6285);
        assert_eq!(gs.stage_budget(1100, 1060, 1.10), 1166);
        assert_eq!(gs.stage_budget(1100, 1060, 2.0), 1166);
        assert_eq!(gs.stage_budget(1060, 1060, 0.5), 1060);
    }

    #[test]
    fn stages_accept_after_profiling_undo() {
        let design = make_design();
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(5, &design.arch);
        let mut gs = GlobalSwap::new(GlobalSwapConfig::default());
        let report = gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();

        assert!(gs.optimal() < report.initial);
        assert!(report.stats.accepted > 0);
        assert!(report.final_objective < report.initial);
        assert_eq!(gs.stages().len(), GlobalSwapConfig::default().budget_multipliers.len());
        assert_eq!(gs.stages().iter().map(|s| s.accepted).sum::<usize>(), report.stats.accepted);
        for stage in gs.stages() {
            assert!(stage.budget >= report.initial);
            assert!(stage.peak.map_or(true, |p| p <= stage.budget), "{stage:?}");
        }
    }

    #[test]
    fn zero_wirelength_is_skipped() {
        let design = crate::engine::test_support::one_row_design(100, &[(0, 20), (200, 20)]);
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(1, &design.arch);
        let mut gs = GlobalSwap::new(GlobalSwapConfig::default());
        let report = gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
        assert_eq!(report.passes, 0);
        assert_eq!(report.stats, GeneratorStats::default());
    }
}
