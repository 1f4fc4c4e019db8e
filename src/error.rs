//! Error taxonomy for the consumer surface.
//!
//! Three failure classes exist:
//! - `InvalidConfiguration` - detected locally, before any boundary call
//! - `Boundary` - a native result code translated once, at the completion site
//! - local state errors (`Cancelled`, `AlreadyClosed`, ...) that never
//!   involve the engine at all

use thiserror::Error;

use crate::engine::ResultCode;

/// Errors surfaced by the consumer client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Options were rejected before reaching the native engine.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The native engine completed an async call with a non-ok result code.
    #[error("{what}: {code}")]
    Boundary {
        code: ResultCode,
        what: &'static str,
    },

    /// The receive cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The consumer was already closed when the operation was issued.
    #[error("consumer already closed")]
    AlreadyClosed,

    /// `receive` was called on a consumer that delivers into a
    /// caller-supplied message channel.
    #[error("receive unavailable: consumer delivers to a caller-supplied channel")]
    NoDefaultChannel,

    /// A one-shot completion was dropped without being invoked. The engine
    /// contract guarantees exactly-once completion, so this indicates a
    /// broken engine binding; the sync wrappers surface it instead of
    /// blocking forever.
    #[error("completion callback dropped before invocation")]
    CompletionDropped,
}

impl ClientError {
    pub(crate) fn from_code(code: ResultCode, what: &'static str) -> Self {
        Self::Boundary { code, what }
    }
}

/// Maps a native result code to the client error space. Called exactly once
/// per async boundary call, at its completion site.
pub(crate) fn translate(code: ResultCode, what: &'static str) -> Result<(), ClientError> {
    if code.is_ok() {
        Ok(())
    } else {
        Err(ClientError::from_code(code, what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_ok_is_ok() {
        assert!(translate(ResultCode::Ok, "noop").is_ok());
    }

    #[test]
    fn test_translate_carries_operation_context() {
        let err = translate(ResultCode::Timeout, "failed to close consumer").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to close consumer: operation timed out"
        );
    }
}
