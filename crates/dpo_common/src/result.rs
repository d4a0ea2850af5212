//! Common result and error types for the placement engine.

/// The standard result type for fallible internal operations.
///
/// `Ok` carries the operation result. For move proposals that is a `bool`
/// where `false` means "no legal move", which is an expected outcome and not
/// an error. `Err` indicates a broken engine invariant (a bug), such as a
/// segment membership table that disagrees with its reverse map. User-facing
/// problems are reported through a `DiagnosticSink` and the operation still
/// returns `Ok`.
pub type DpoResult<T> = Result<T, InternalError>;

/// An internal placement error indicating a bug, not a problem with the input design.
///
/// These errors should never occur during normal operation. When one does,
/// the current optimization pass is aborted.
#[derive(Debug, thiserror::Error)]
#[error("internal placement error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("cell 4 missing from segment 2");
        assert_eq!(
            format!("{err}"),
            "internal placement error: cell 4 missing from segment 2"
        );
    }

    #[test]
    fn ok_path() {
        let r: DpoResult<bool> = Ok(false);
        assert!(r.is_ok());
        assert_eq!(r.ok(), Some(false));
    }

    #[test]
    fn err_path() {
        let r: DpoResult<bool> = Err(InternalError::new("span mismatch"));
        let err = r.err().unwrap();
        assert_eq!(err.message, "span mismatch");
    }

    #[test]
    fn from_string() {
        let err: InternalError = format!("segment {} out of range", 7).into();
        assert_eq!(err.message, "segment 7 out of range");
    }

    #[test]
    fn question_mark_propagates() {
        fn inner() -> DpoResult<u32> {
            Err(InternalError::new("inner"))
        }
        fn outer() -> DpoResult<u32> {
            let v = inner()?;
            Ok(v + 1)
        }
        assert_eq!(outer().unwrap_err().message, "inner");
    }
}
