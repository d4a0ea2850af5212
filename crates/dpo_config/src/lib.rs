//! Parsing and validation of `dpo.toml` optimization configuration files.
//!
//! This crate reads the optimizer configuration and produces a strongly-typed
//! [`DpoConfig`] covering legalization limits, the parameters of each move
//! generator, and the ordered optimization script.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config};
pub use types::*;
