//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::DpoConfig;
use std::path::Path;

/// Loads and validates a `dpo.toml` configuration from a directory.
///
/// Reads `<dir>/dpo.toml`, parses it, and validates parameter ranges.
pub fn load_config(dir: &Path) -> Result<DpoConfig, ConfigError> {
    let config_path = dir.join("dpo.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `dpo.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<DpoConfig, ConfigError> {
    let config: DpoConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn check_tolerance(section: &str, tolerance: f64) -> Result<(), ConfigError> {
    if !(tolerance > 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "{section}.tolerance must be positive, got {tolerance}"
        )));
    }
    Ok(())
}

fn check_weight(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Validates that configuration values are within their supported ranges.
pub fn validate_config(config: &DpoConfig) -> Result<(), ConfigError> {
    if config.legalize.move_limit == 0 {
        return Err(ConfigError::ValidationError(
            "legalize.move_limit must be at least 1".to_string(),
        ));
    }

    check_tolerance("global_swap", config.global_swap.tolerance)?;
    check_tolerance("vertical_swap", config.vertical_swap.tolerance)?;
    check_tolerance("reorder", config.reorder.tolerance)?;
    check_tolerance("mis", config.mis.tolerance)?;

    let gs = &config.global_swap;
    if gs.budget_multipliers.is_empty() {
        return Err(ConfigError::MissingField(
            "global_swap.budget_multipliers".to_string(),
        ));
    }
    if !(gs.profiling_excess >= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "global_swap.profiling_excess must be at least 1.0, got {}",
            gs.profiling_excess
        )));
    }
    for (i, m) in gs.budget_multipliers.iter().enumerate() {
        check_weight(&format!("global_swap.budget_multipliers[{i}]"), *m)?;
    }
    check_weight("global_swap.tradeoff", gs.tradeoff)?;
    check_weight("global_swap.user_congestion_weight", gs.user_congestion_weight)?;
    check_weight("global_swap.area_weight", gs.area_weight)?;
    check_weight("global_swap.pin_weight", gs.pin_weight)?;
    if gs.normalization_interval == 0 {
        return Err(ConfigError::ValidationError(
            "global_swap.normalization_interval must be at least 1".to_string(),
        ));
    }

    if !(2..=4).contains(&config.reorder.window) {
        return Err(ConfigError::ValidationError(format!(
            "reorder.window must be in 2..=4, got {}",
            config.reorder.window
        )));
    }

    if config.mis.max_problem_size < 2 {
        return Err(ConfigError::ValidationError(
            "mis.max_problem_size must be at least 2".to_string(),
        ));
    }
    Ok(())
}
