//! Shared foundational types used across the dpo detailed placement workspace.
//!
//! This crate provides the fatal error type raised on broken placement
//! invariants and the axis-aligned rectangle used by the cell database,
//! fence regions, and blockage extraction.

#![warn(missing_docs)]

pub mod rect;
pub mod result;

pub use rect::Rect;
pub use result::{DpoResult, InternalError};
