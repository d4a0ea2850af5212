//! Configuration types deserialized from `dpo.toml`.

use serde::{Deserialize, Serialize};

/// The top-level optimizer configuration parsed from `dpo.toml`.
///
/// Every section is optional; an empty file yields [`DpoConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DpoConfig {
    /// Legalization limits shared by every generator.
    pub legalize: LegalizeConfig,
    /// Global swap generator parameters.
    pub global_swap: GlobalSwapConfig,
    /// Vertical swap generator parameters.
    pub vertical_swap: PassConfig,
    /// Window reorder generator parameters.
    pub reorder: ReorderConfig,
    /// Independent-set matching parameters.
    pub mis: MisConfig,
    /// The ordered optimization script.
    pub flow: FlowConfig,
}

/// Limits applied to every move regardless of which generator proposed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalizeConfig {
    /// Seed for the legalization random number generator.
    pub seed: u64,
    /// Maximum horizontal displacement in row heights; `0` keeps the chip-wide default.
    pub max_displacement_x: u32,
    /// Maximum vertical displacement in row heights; `0` keeps the chip-wide default.
    pub max_displacement_y: u32,
    /// Maximum number of journal actions a single proposal may stage.
    pub move_limit: usize,
    /// Reject placements that leave a gap of exactly one site between neighbors.
    pub disallow_one_site_gaps: bool,
}

impl Default for LegalizeConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            max_displacement_x: 0,
            max_displacement_y: 0,
            move_limit: 100,
            disallow_one_site_gaps: false,
        }
    }
}

/// Pass count and convergence tolerance shared by all generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Maximum number of passes per invocation.
    pub passes: u32,
    /// Stop early once a pass improves the objective by less than this fraction.
    pub tolerance: f64,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            tolerance: 0.01,
        }
    }
}

/// Parameters of the budgeted two-phase global swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSwapConfig {
    /// Maximum number of passes per stage.
    pub passes: u32,
    /// Relative improvement below which a stage stops early.
    pub tolerance: f64,
    /// Probability in `[0, 1]` of skipping the wirelength-optimal target in
    /// favour of a random probe during the power phase.
    pub tradeoff: f64,
    /// Wirelength budget as a multiple of the profiled optimum.
    pub profiling_excess: f64,
    /// Per-stage budget multipliers; the number of entries sets the stage count.
    pub budget_multipliers: Vec<f64>,
    /// Number of trial moves used to calibrate the power weight.
    pub sampling_moves: usize,
    /// User scaling applied to the calibrated power weight.
    pub user_congestion_weight: f64,
    /// Accepted moves between utilization map renormalizations.
    pub normalization_interval: usize,
    /// Weight of cell area in the utilization density.
    pub area_weight: f64,
    /// Weight of pin count in the utilization density.
    pub pin_weight: f64,
}

impl Default for GlobalSwapConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            tolerance: 0.01,
            tradeoff: 0.2,
            profiling_excess: 1.10,
            budget_multipliers: vec![1.10, 1.10, 1.10, 1.10],
            sampling_moves: 150,
            user_congestion_weight: 35.0,
            normalization_interval: 1000,
            area_weight: 0.4,
            pin_weight: 0.6,
        }
    }
}

/// Parameters of the sliding-window reorderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Maximum number of passes per invocation.
    pub passes: u32,
    /// Relative improvement below which the reorderer stops early.
    pub tolerance: f64,
    /// Number of consecutive cells permuted together (2 to 4).
    pub window: usize,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            tolerance: 0.01,
            window: 3,
        }
    }
}

/// The objective minimized by independent-set matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MisObjective {
    /// Half-perimeter wirelength of the nets touching each cell.
    Wirelength,
    /// L1 displacement from each cell's original position.
    Displacement,
}

/// Parameters of independent-set matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MisConfig {
    /// Maximum number of passes per invocation.
    pub passes: u32,
    /// Relative improvement below which matching stops early.
    pub tolerance: f64,
    /// Cost used when building each matching problem.
    pub objective: MisObjective,
    /// Cells gathered around a seed before a matching problem is solved.
    pub max_problem_size: usize,
    /// Number of problems a single cell may join per pass.
    pub max_times_used: usize,
    /// Nets with more pins than this are ignored by the colouring.
    pub skip_nets_larger_than: usize,
}

impl Default for MisConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            tolerance: 0.01,
            objective: MisObjective::Wirelength,
            max_problem_size: 50,
            max_times_used: 3,
            skip_nets_larger_than: 100,
        }
    }
}

/// The ordered list of generator invocations to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Generator command lines, e.g. `"gs -p 2 -x 0.3"`.
    pub script: Vec<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            script: vec![
                "mis -p 1".to_string(),
                "gs -p 1".to_string(),
                "vs -p 1".to_string(),
                "ro -p 1".to_string(),
            ],
        }
    }
}
