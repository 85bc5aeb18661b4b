//! Error taxonomy for the execution core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors `mova-core` can produce, matching the taxonomy in the spec's
/// error handling design one-to-one, plus the structural variants the
/// engine itself needs.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum MovaError {
    /// Action config failed validation. Never retried.
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    /// Security Gate rejected an outbound request. Never retried.
    #[error("security validation failed: {message}")]
    SecurityDenied { message: String },

    /// Network/IO failure. Retried per policy.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Handler or HTTP timeout. Retried per policy.
    #[error("{message}")]
    Timeout { message: String, duration_ms: u64 },

    /// HTTP non-2xx after allowed retries. Classified via the Policy Engine.
    #[error("bad response: status {status}")]
    BadResponse { status: u16, body: String },

    /// Admission denied by the Budget Accountant. Surfaced to caller, no retry.
    #[error("budget exceeded: {scope}")]
    BudgetExceeded { scope: String, reset_at: i64 },

    /// Cooperative cancellation. Terminal, not retried.
    #[error("cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Retry attempts exhausted; the action has been handed to the DLQ.
    #[error("retry attempts exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("persistence error: {message}")]
    Persistence { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, MovaError>;

impl From<serde_json::Error> for MovaError {
    fn from(err: serde_json::Error) -> Self {
        MovaError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MovaError {
    fn from(err: serde_yaml::Error) -> Self {
        MovaError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MovaError {
    fn from(err: std::io::Error) -> Self {
        MovaError::Persistence { message: err.to_string() }
    }
}

impl MovaError {
    /// True for the error kinds the spec's §7 taxonomy marks as
    /// never-retried regardless of policy (invalid_config, security_denied,
    /// budget_exceeded, cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MovaError::InvalidConfig { .. }
                | MovaError::SecurityDenied { .. }
                | MovaError::BudgetExceeded { .. }
                | MovaError::Cancelled
        )
    }

    /// The taxonomy name used by the Policy Engine's `error_kind` condition.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MovaError::InvalidConfig { .. } => "invalid_config",
            MovaError::SecurityDenied { .. } => "security_denied",
            MovaError::Transport { .. } => "transport",
            MovaError::Timeout { .. } => "timeout",
            MovaError::BadResponse { .. } => "bad_response",
            MovaError::BudgetExceeded { .. } => "budget_exceeded",
            MovaError::Cancelled => "cancelled",
            MovaError::Internal { .. } => "internal",
            MovaError::RetryExhausted { .. } => "internal",
            MovaError::Serialization(_) => "internal",
            MovaError::Persistence { .. } => "internal",
            MovaError::Configuration { .. } => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_denied_message_matches_spec_wording() {
        let err = MovaError::SecurityDenied {
            message: "host 169.254.169.254 is explicitly denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "security validation failed: host 169.254.169.254 is explicitly denied"
        );
    }

    #[test]
    fn terminal_kinds_are_not_retried() {
        assert!(MovaError::InvalidConfig { message: "x".into() }.is_terminal());
        assert!(MovaError::SecurityDenied { message: "x".into() }.is_terminal());
        assert!(MovaError::BudgetExceeded { scope: "global".into(), reset_at: 0 }.is_terminal());
        assert!(MovaError::Cancelled.is_terminal());
        assert!(!MovaError::Transport { message: "x".into() }.is_terminal());
    }
}
