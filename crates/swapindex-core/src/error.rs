//! Error types for the swap indexing pipeline.

use thiserror::Error;

/// Errors that can occur while applying an event.
///
/// Filtered and duplicate events are not errors; they are reported through
/// [`ProcessOutcome`](crate::engine::ProcessOutcome).
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Decode error in '{schema}': {reason}")]
    Decode { schema: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub(crate) fn decode(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the event itself is malformed (retrying will not help).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns `true` if the failure came from the storage backend and the
    /// event may be redelivered.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let e = IndexerError::decode("EscrowWithdrawal", "missing field `secret`");
        assert!(e.is_decode());
        assert!(!e.is_retryable());
        assert_eq!(
            e.to_string(),
            "Decode error in 'EscrowWithdrawal': missing field `secret`"
        );

        let s = IndexerError::Storage("disk full".into());
        assert!(s.is_retryable());
        assert!(!s.is_decode());
    }
}
