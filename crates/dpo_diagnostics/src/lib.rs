//! Diagnostic creation and severity management for placement reports.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! error codes, and an optional design subject (a cell, segment, or row).
//! The thread-safe [`DiagnosticSink`] accumulates diagnostics emitted while a
//! placement flow runs: script errors, legality violations found by the
//! post-pass checks, and summary notes.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Subject};
pub use severity::Severity;
pub use sink::DiagnosticSink;
