use thiserror::Error;

/// The pipeline's single error taxonomy (semantic, not per-module).
///
/// Every action, scheduler, tracker and cache operation returns this type so that
/// the worker runtime can make one retry decision based on `retryable()` rather
/// than matching on a different error type per subsystem.
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("repository failure: {0}")]
    RepositoryFailure(String),

    #[error("transient io error: {0}")]
    TransientIo(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("retries exhausted: {0}")]
    Exhausted(String),

    #[error("programming error: {0}")]
    ProgrammingError(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn missing_dependency(msg: impl Into<String>) -> Self {
        Self::MissingDependency(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::RepositoryFailure(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    /// True for `RepositoryFailure` / `TransientIo` / `Timeout` — the kinds §7 allows
    /// to be retried up to `maxAttempts` before becoming `Exhausted`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::RepositoryFailure(_) | PipelineError::TransientIo(_) | PipelineError::Timeout(_)
        )
    }

    /// True for errors that must never be retried: bad input, absent dependency,
    /// invariant violation, or cooperative cancellation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::MissingDependency(_)
                | PipelineError::ProgrammingError(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }

    /// Promote a retryable error whose retry budget has been spent.
    pub fn into_exhausted(self) -> Self {
        match self {
            PipelineError::Exhausted(_) => self,
            other => PipelineError::Exhausted(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_are_exactly_repository_transient_and_timeout() {
        assert!(PipelineError::repository("db down").is_retryable());
        assert!(PipelineError::transient("socket reset").is_retryable());
        assert!(PipelineError::Timeout("slow".into()).is_retryable());

        assert!(!PipelineError::invalid_input("bad").is_retryable());
        assert!(!PipelineError::missing_dependency("queue").is_retryable());
        assert!(!PipelineError::ProgrammingError("invariant".into()).is_retryable());
        assert!(!PipelineError::Cancelled("stop".into()).is_retryable());
    }

    #[test]
    fn fatal_kinds_never_overlap_retryable_kinds() {
        let fatal = [
            PipelineError::invalid_input("x"),
            PipelineError::missing_dependency("x"),
            PipelineError::ProgrammingError("x".into()),
        ];
        for err in fatal {
            assert!(err.is_fatal());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn into_exhausted_wraps_message_once() {
        let err = PipelineError::transient("flaky").into_exhausted();
        assert!(matches!(err, PipelineError::Exhausted(_)));
        assert_eq!(err.to_string(), "retries exhausted: transient io error: flaky");

        // Idempotent: exhausting an already-exhausted error doesn't double-wrap.
        let err2 = err.clone().into_exhausted();
        assert_eq!(err.to_string(), err2.to_string());
    }
}
