//! Carrier error classification.

use thiserror::Error;

/// Errors from carrier calls, split by whether a retry can help.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// The carrier processed the request and rejected it (bad pincode,
    /// duplicate reference, cancellation past cutoff). Retrying the same
    /// request returns the same answer.
    #[error("carrier rejected request: {0}")]
    Business(String),

    /// The request did not complete: connect failure, timeout, 5xx.
    #[error("carrier transport error: {0}")]
    Transport(String),

    /// The carrier returned a payload we could not interpret.
    #[error("carrier response parse error: {0}")]
    Parse(String),
}

impl CarrierError {
    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CarrierError::Transport(_))
    }
}

impl From<reqwest::Error> for CarrierError {
    fn from(e: reqwest::Error) -> Self {
        CarrierError::Transport(e.to_string())
    }
}

impl From<quick_xml::Error> for CarrierError {
    fn from(e: quick_xml::Error) -> Self {
        CarrierError::Parse(e.to_string())
    }
}

/// Convenience type alias for carrier results.
pub type Result<T> = std::result::Result<T, CarrierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(CarrierError::Transport("timeout".into()).is_retryable());
        assert!(!CarrierError::Business("bad pincode".into()).is_retryable());
        assert!(!CarrierError::Parse("truncated".into()).is_retryable());
    }
}
