//! How serious a placement diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity, ordered `Note < Warning < Error`.
///
/// Notes summarize a clean outcome, warnings report legality violations left
/// in the final placement, and errors report script steps that were skipped.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational summary.
    Note,
    /// Remaining violation of a legality rule.
    Warning,
    /// Malformed or unknown optimization step.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Severity for a verification class with `count` violations.
    pub fn for_violations(count: usize) -> Self {
        if count == 0 {
            Severity::Note
        } else {
            Severity::Warning
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}
