//! Move generators.
//!
//! A generator walks the design, asks the [`MoveEngine`] for proposals, and
//! decides for itself whether each verified proposal is kept. Generators
//! never touch the placement directly; everything goes through
//! propose/commit/rollback so a rejected proposal leaves no trace.
//!
//! Generators are driven by short command strings such as `gs -p 2 -x 0.3`.
//! The first token names the generator and the rest is parsed by clap into
//! [`GeneratorArgs`].

mod flow;
mod global_swap;
mod mis;
mod range;
mod reorder;
mod vertical_swap;

pub use flow::{FlowNetwork, MinCostFlow};
pub use global_swap::{GlobalSwap, StageOutcome};
pub use mis::IndependentSetMatching;
pub use range::{optimal_region, MAX_REGION_NET_PINS};
pub use reorder::WindowReorder;
pub use vertical_swap::VerticalSwap;

use crate::context::LegalizationContext;
use crate::engine::MoveEngine;
use crate::ids::CellId;
use clap::Parser;
use dpo_common::DpoResult;
use dpo_config::DpoConfig;
use std::fmt;
use tracing::debug;

/// Smallest improvement tolerance a pass loop accepts.
pub const MIN_TOLERANCE: f64 = 0.01;

/// Arguments accepted by every generator command.
///
/// Flags a generator does not use are parsed and ignored.
#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
pub struct GeneratorArgs {
    /// Number of passes.
    #[arg(short = 'p')]
    pub passes: Option<u32>,
    /// Stop once a pass improves by less than this fraction.
    #[arg(short = 't', allow_negative_numbers = true)]
    pub tolerance: Option<f64>,
    /// Probability of a random rather than wirelength-driven move.
    #[arg(short = 'x', allow_negative_numbers = true)]
    pub tradeoff: Option<f64>,
    /// Window size for reordering.
    #[arg(short = 'w')]
    pub window: Option<usize>,
    /// Optimize displacement instead of wirelength.
    #[arg(short = 'd')]
    pub displacement: bool,
}

impl GeneratorArgs {
    /// Parses the flag tokens of one command.
    pub fn parse_tokens<I, T>(tokens: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(tokens)
    }

    /// Pass count, falling back to `default`, at least one.
    pub fn passes_or(&self, default: u32) -> u32 {
        self.passes.unwrap_or(default).max(1)
    }

    /// Tolerance, falling back to `default`, at least [`MIN_TOLERANCE`].
    pub fn tolerance_or(&self, default: f64) -> f64 {
        self.tolerance.unwrap_or(default).max(MIN_TOLERANCE)
    }

    /// Tradeoff, falling back to `default`, clamped to `[0, 1]`.
    pub fn tradeoff_or(&self, default: f64) -> f64 {
        self.tradeoff.unwrap_or(default).clamp(0.0, 1.0)
    }

    /// Window size, falling back to `default`, clamped to `2..=4`.
    pub fn window_or(&self, default: usize) -> usize {
        self.window.unwrap_or(default).clamp(2, 4)
    }
}

/// Splits a script step into its generator name and flag tokens.
///
/// Returns `None` for a blank step.
pub fn split_command(step: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = step.split_whitespace();
    let name = tokens.next()?;
    Some((name, tokens.collect()))
}

/// Counters kept by every generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Calls to `generate`.
    pub attempts: usize,
    /// Verified single-cell moves.
    pub moves: usize,
    /// Verified swaps.
    pub swaps: usize,
    /// Proposals that were committed.
    pub accepted: usize,
}

impl fmt::Display for GeneratorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts {}, moves {}, swaps {}, accepted {}",
            self.attempts, self.moves, self.swaps, self.accepted
        )
    }
}

/// Outcome of one generator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Generator name, as used in scripts.
    pub generator: &'static str,
    /// Objective before the first pass.
    pub initial: i64,
    /// Objective after the last pass.
    pub final_objective: i64,
    /// Percentage by which the objective dropped.
    pub improvement: f64,
    /// Passes actually run.
    pub passes: u32,
    /// Counters accumulated during the invocation.
    pub stats: GeneratorStats,
}

impl PassReport {
    /// Builds a report, deriving the percentage improvement.
    pub fn new(
        generator: &'static str,
        initial: i64,
        final_objective: i64,
        passes: u32,
        stats: GeneratorStats,
    ) -> Self {
        let improvement = if initial > 0 {
            100.0 * (initial - final_objective) as f64 / initial as f64
        } else {
            0.0
        };
        Self {
            generator,
            initial,
            final_objective,
            improvement,
            passes,
            stats,
        }
    }
}

/// A source of placement proposals with its own acceptance policy.
pub trait MoveGenerator {
    /// Name used in scripts and logs.
    fn name(&self) -> &'static str;

    /// Precomputes per-cell data before the first pass.
    fn init(&mut self, engine: &MoveEngine<'_>, ctx: &mut LegalizationContext) -> DpoResult<()>;

    /// Makes one proposal around `cell`.
    ///
    /// On `Ok(true)` a verified proposal is staged in the engine and the
    /// caller must commit or roll it back. On `Ok(false)` nothing changed.
    fn generate(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        cell: CellId,
    ) -> DpoResult<bool>;

    /// Runs one invocation of one or more passes.
    fn run(
        &mut self,
        engine: &mut MoveEngine<'_>,
        ctx: &mut LegalizationContext,
        args: &GeneratorArgs,
    ) -> DpoResult<PassReport>;

    /// Counters accumulated so far.
    fn stats(&self) -> GeneratorStats;
}

/// Creates the generator a script step names, configured from `config`.
pub fn create_generator(name: &str, config: &DpoConfig) -> Option<Box<dyn MoveGenerator>> {
    let generator: Box<dyn MoveGenerator> = match name {
        "gs" => Box::new(GlobalSwap::new(config.global_swap.clone())),
        "vs" => Box::new(VerticalSwap::new(config.vertical_swap.clone())),
        "ro" => Box::new(WindowReorder::new(config.reorder.clone())),
        "mis" => Box::new(IndependentSetMatching::new(config.mis.clone())),
        _ => return None,
    };
    debug!(generator = generator.name(), "generator created");
    Some(generator)
}

/// Returns `true` once a pass improved the objective by at most
/// `tolerance` of its previous value.
pub(crate) fn converged(last: i64, curr: i64, tolerance: f64) -> bool {
    if last <= 0 {
        return true;
    }
    (last - curr).abs() as f64 / last as f64 <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_tokens() {
        assert_eq!(split_command("gs -p 2 -x 0.3"), Some(("gs", vec!["-p", "2", "-x", "0.3"])));
        assert_eq!(split_command("   "), None);
        assert_eq!(split_command("ro"), Some(("ro", vec![])));
    }

    #[test]
    fn args_parse_and_clamp() {
        let args = GeneratorArgs::parse_tokens(["-p", "3", "-t", "0.001", "-x", "1.5", "-w", "9", "-d"]).unwrap();
        assert_eq!(args.passes, Some(3));
        assert_eq!(args.tolerance_or(0.5), MIN_TOLERANCE);
        assert_eq!(args.tradeoff_or(0.2), 1.0);
        assert_eq!(args.window_or(3), 4);
        assert!(args.displacement);

        let empty = GeneratorArgs::parse_tokens(Vec::<&str>::new()).unwrap();
        assert_eq!(empty.passes_or(0), 1);
        assert_eq!(empty.tolerance_or(0.05), 0.05);
        assert_eq!(empty.window_or(1), 2);
        assert!(!empty.displacement);
    }

    #[test]
    fn negative_tradeoff_clamps_to_zero() {
        let args = GeneratorArgs::parse_tokens(["-x", "-0.5"]).unwrap();
        assert_eq!(args.tradeoff_or(0.2), 0.0);
    }

    #[test]
    fn bad_flags_are_errors() {
        assert!(GeneratorArgs::parse_tokens(["-q"]).is_err());
        assert!(GeneratorArgs::parse_tokens(["-p", "many"]).is_err());
    }

    #[test]
    fn unknown_generator_is_none() {
        let config = DpoConfig::default();
        assert!(create_generator("sa", &config).is_none());
        for name in ["gs", "vs", "ro", "mis"] {
            assert_eq!(create_generator(name, &config).unwrap().name(), name);
        }
    }

    #[test]
    fn report_improvement_percent() {
        let r = PassReport::new("gs", 200, 150, 1, GeneratorStats::default());
        assert!((r.improvement - 25.0).abs() < 1e-9);
        assert_eq!(PassReport::new("gs", 0, 0, 1, GeneratorStats::default()).improvement, 0.0);
    }

    #[test]
    fn convergence_threshold() {
        assert!(converged(100, 99, 0.01));
        assert!(!converged(100, 90, 0.01));
        assert!(converged(0, 0, 0.01));
    }
}
