//! Error types for the signal pipeline
//!
//! Errors are classified by who can resolve them:
//! - Retryable: storage hiccups (locked database, transient IO)
//! - NonRetryable: malformed input from the caller (unknown signal, bad score)
//! - RequiresUserAction: configuration problems the user has to fix
//!
//! Normal absence (empty catalog, no plan yet, no pending trigger) is never an
//! error. Those lookups return `None` or an empty collection instead.

use thiserror::Error;

use crate::persistence::StoreError;

/// Error types for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    // Caller errors
    #[error("Signal {signal_id} is not in the catalog for {account_id} ({week_key})")]
    InvalidSelection {
        account_id: String,
        week_key: String,
        signal_id: String,
    },

    #[error("Confidence score {0} is outside 0..=100")]
    ConfidenceOutOfRange(i64),

    #[error("At most 2 needs can be requested per brief, got {0}")]
    TooManyNeeds(usize),

    #[error("Unknown episode: {0}")]
    UnknownEpisode(String),

    #[error("Invalid week key: {0}")]
    InvalidWeekKey(String),

    // Storage
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    // Requires user action
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Returns true if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Storage(e) if e.is_transient())
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }

    /// Name of the operation that produced this error, for UI messaging.
    pub fn operation(&self) -> &'static str {
        match self {
            PipelineError::InvalidSelection { .. } => "promote",
            PipelineError::ConfidenceOutOfRange(_) => "signal",
            PipelineError::TooManyNeeds(_) => "quick_brief",
            PipelineError::UnknownEpisode(_) => "update_progress",
            PipelineError::InvalidWeekKey(_) => "week_key",
            PipelineError::Storage(_) => "storage",
            PipelineError::Config(_) => "config",
        }
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PipelineError::InvalidSelection { .. } => {
                "The signal list changed. Refresh the signals and select again."
            }
            PipelineError::ConfidenceOutOfRange(_) => "Check the signal feed for malformed scores.",
            PipelineError::TooManyNeeds(_) => "Pick at most two needs for a quick brief.",
            PipelineError::UnknownEpisode(_) => "Reload the briefing catalog.",
            PipelineError::InvalidWeekKey(_) => "Use a week key like 2026-W07.",
            PipelineError::Storage(_) => "Check disk space and file permissions, then try again.",
            PipelineError::Config(_) => "Check your configuration in ~/.dealsignal/config.json",
        }
    }
}

/// Serializable error representation for the rendering layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineErrorView {
    pub message: String,
    pub error_type: ErrorType,
    pub operation: String,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&PipelineError> for PipelineErrorView {
    fn from(err: &PipelineError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        PipelineErrorView {
            message: err.to_string(),
            error_type,
            operation: err.operation().to_string(),
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_selection_view() {
        let err = PipelineError::InvalidSelection {
            account_id: "acme".to_string(),
            week_key: "2026-W07".to_string(),
            signal_id: "sig-9".to_string(),
        };
        let view = PipelineErrorView::from(&err);
        assert_eq!(view.error_type, ErrorType::NonRetryable);
        assert_eq!(view.operation, "promote");
        assert!(!view.can_retry);
        assert!(view.message.contains("sig-9"));
    }

    #[test]
    fn test_config_requires_user_action() {
        let err = PipelineError::Config("bad json".to_string());
        assert!(err.requires_user_action());
        let json = serde_json::to_value(PipelineErrorView::from(&err)).unwrap();
        assert_eq!(json["errorType"], "requiresUserAction");
        assert_eq!(json["recoverySuggestion"], err.recovery_suggestion());
    }

    #[test]
    fn test_locked_storage_is_retryable() {
        let err = PipelineError::Storage(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "locked",
        )));
        assert!(err.is_retryable());
    }
}
