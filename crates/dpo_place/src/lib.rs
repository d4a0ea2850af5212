//! Detailed placement legalization and local optimization.
//!
//! This crate takes a design whose cells sit roughly where a global placer
//! put them and makes it legal and better: every cell lands on a row and
//! the site grid, inside its fence region, without overlap, and the
//! wirelength is then reduced by small legality-preserving moves.
//!
//! # Pipeline
//!
//! 1. **Segments**: split every row into free intervals around fixed cells,
//!    blockages, and fence regions
//! 2. **Assign**: snap each movable cell into its nearest segment (or stack
//!    of segments for multi-height cells)
//! 3. **Optimize**: run the `[flow].script` generators in order; each one
//!    proposes moves through the transactional [`MoveEngine`]
//! 4. **Verify**: count the remaining violations and report them through
//!    the diagnostic sink
//!
//! # Usage
//!
//! ```ignore
//! use dpo_place::{default_checker, optimize};
//!
//! let sink = DiagnosticSink::new();
//! let report = optimize(&mut design, &config, default_checker(&config), &sink)?;
//! assert!(report.violations.is_clean());
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod db;
pub mod density;
pub mod drc;
pub mod engine;
pub mod generators;
pub mod ids;
pub mod journal;
pub mod objective;
pub mod placement;
pub mod segment;
pub mod verify;

pub use context::{DisplacementLimits, LegalizationContext};
pub use db::{Architecture, Cell, Design, Net, Netlist, Pin, PowerRail, Region, Row};
pub use drc::{EdgeSpacingChecker, PlacementChecker, PlacementView};
pub use engine::{AssignReport, MoveEngine, TransactionState};
pub use generators::{create_generator, GeneratorArgs, GeneratorStats, MoveGenerator, PassReport};
pub use ids::{CellId, NetId, PinId, RegionId, RowId, SegmentId};
pub use journal::{Journal, MoveAction};
pub use objective::{displacement, total_hpwl, DisplacementStats};
pub use placement::Placement;
pub use verify::{verify_placement, ViolationCounts};

use dpo_common::DpoResult;
use dpo_config::DpoConfig;
use dpo_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Subject};
use tracing::{debug, info};

/// Outcome of a full [`optimize`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeReport {
    /// Movement caused by the initial segment assignment.
    pub assignment: AssignReport,
    /// One report per script step that ran.
    pub steps: Vec<PassReport>,
    /// Total wirelength after the last step.
    pub final_hpwl: i64,
    /// Movement of the final placement relative to the input.
    pub displacement: DisplacementStats,
    /// Post-pass verification counts.
    pub violations: ViolationCounts,
}

/// The edge-spacing checker configured by `[legalize]`.
pub fn default_checker(config: &DpoConfig) -> Box<dyn PlacementChecker> {
    Box::new(EdgeSpacingChecker::new(config.legalize.disallow_one_site_gaps))
}

/// Legalizes and optimizes `design` in place.
///
/// Script steps naming an unknown generator or carrying malformed flags are
/// reported as error diagnostics and skipped. Only broken engine invariants
/// abort the run, in which case `design` is left untouched.
pub fn optimize(
    design: &mut Design,
    config: &DpoConfig,
    checker: Box<dyn PlacementChecker>,
    sink: &DiagnosticSink,
) -> DpoResult<OptimizeReport> {
    design.validate()?;
    let (placement, report) = run_script(design, config, checker, sink)?;
    design.apply_placement(&placement);
    Ok(report)
}

fn run_script(
    design: &Design,
    config: &DpoConfig,
    checker: Box<dyn PlacementChecker>,
    sink: &DiagnosticSink,
) -> DpoResult<(Placement, OptimizeReport)> {
    let legalize = &config.legalize;
    let mut engine = MoveEngine::new(design, checker)?.with_move_limit(legalize.move_limit);
    let mut ctx = LegalizationContext::new(legalize.seed, &design.arch);
    ctx.set_max_displacement(legalize.max_displacement_x, legalize.max_displacement_y);

    let assignment = engine.assign_cells_to_segments()?;
    let mut steps = Vec::new();

    for (n, step) in config.flow.script.iter().enumerate() {
        let Some((name, tokens)) = generators::split_command(step) else {
            continue;
        };
        let Some(mut generator) = create_generator(name, config) else {
            sink.emit(
                Diagnostic::error(
                    DiagnosticCode::new(Category::Script, 2),
                    format!("unknown generator '{name}'"),
                    Subject::Design,
                )
                .with_note(format!("in script step {}: `{step}`", n + 1))
                .with_help("known generators are gs, vs, ro, and mis"),
            );
            continue;
        };
        let args = match GeneratorArgs::parse_tokens(tokens) {
            Ok(args) => args,
            Err(err) => {
                let detail = err.to_string();
                let first = detail.lines().next().unwrap_or_default();
                sink.emit(
                    Diagnostic::error(
                        DiagnosticCode::new(Category::Script, 1),
                        format!("invalid arguments for '{name}'"),
                        Subject::Design,
                    )
                    .with_note(first.trim_start_matches("error: ").to_string())
                    .with_note(format!("in script step {}: `{step}`", n + 1)),
                );
                continue;
            }
        };
        debug!(step = %step, ?args, "running script step");
        steps.push(generator.run(&mut engine, &mut ctx, &args)?);
    }

    let violations = verify_placement(&engine, legalize.disallow_one_site_gaps, sink)?;
    let final_hpwl = total_hpwl(engine.netlist(), engine.placement());
    let moved = displacement(engine.netlist(), engine.original_placement(), engine.placement());
    info!(
        steps = steps.len(),
        final_hpwl,
        max_displacement = moved.max,
        violations = violations.total(),
        "optimization finished"
    );

    let report = OptimizeReport {
        assignment,
        steps,
        final_hpwl,
        displacement: moved,
        violations,
    };
    Ok((engine.into_placement(), report))
}
