//! Structured diagnostic messages with severity, codes, and a design subject.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The design object a diagnostic refers to.
///
/// Indices are raw database indices so that this crate stays independent of
/// the placement id types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Subject {
    /// The design as a whole.
    Design,
    /// A single cell, by raw cell index.
    Cell(u32),
    /// A row segment, by raw segment index.
    Segment(u32),
    /// A placement row, by raw row index.
    Row(u32),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Design => write!(f, "design"),
            Subject::Cell(i) => write!(f, "cell {i}"),
            Subject::Segment(i) => write!(f, "segment {i}"),
            Subject::Row(i) => write!(f, "row {i}"),
        }
    }
}

/// A structured diagnostic message.
///
/// Each diagnostic includes:
/// - A severity level and unique code
/// - A primary message and the design object it concerns
/// - Optional notes and help text
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The design object this diagnostic concerns.
    pub subject: Subject,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic of the given severity.
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        subject: Subject,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            subject,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic with the given code, message, and subject.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, subject: Subject) -> Self {
        Self::new(Severity::Error, code, message, subject)
    }

    /// Creates a new warning diagnostic with the given code, message, and subject.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, subject: Subject) -> Self {
        Self::new(Severity::Warning, code, message, subject)
    }

    /// Creates a new note diagnostic with the given code, message, and subject.
    pub fn note(code: DiagnosticCode, message: impl Into<String>, subject: Subject) -> Self {
        Self::new(Severity::Note, code, message, subject)
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({})",
            self.severity, self.code, self.message, self.subject
        )?;
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        for help in &self.help {
            write!(f, "\n  = help: {help}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Script, 1);
        let diag = Diagnostic::error(code, "unknown generator 'foo'", Subject::Design);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "unknown generator 'foo'");
        assert_eq!(format!("{}", diag.code), "S001");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Category::Placement, 101);
        let diag = Diagnostic::warning(code, "2 overlapping cells", Subject::Segment(3));
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.subject, Subject::Segment(3));
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Placement, 102);
        let diag = Diagnostic::warning(code, "padding violated", Subject::Cell(7))
            .with_note("left neighbor is cell 6")
            .with_help("rerun legalization");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn display_includes_notes() {
        let code = DiagnosticCode::new(Category::Placement, 105);
        let diag = Diagnostic::note(code, "all checks passed", Subject::Design)
            .with_note("0 violations");
        let text = format!("{diag}");
        assert!(text.starts_with("note[P105]: all checks passed (design)"));
        assert!(text.contains("= note: 0 violations"));
    }
}
