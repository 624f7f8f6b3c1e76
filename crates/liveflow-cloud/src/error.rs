//! Reconciliation error types

use crate::validation::Violation;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by resource reconcilers
///
/// Remote messages are carried verbatim; the variant and its fields supply the
/// entity type, ID and field group needed to diagnose a failure.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("invalid {resource_type} configuration: {}", format_violations(.violations))]
    Validation {
        resource_type: String,
        violations: Vec<Violation>,
    },

    #[error("{resource_type} ({id}) not found")]
    NotFound { resource_type: String, id: String },

    #[error("error creating {resource_type}: {message}")]
    CreateFailed {
        resource_type: String,
        message: String,
    },

    #[error("error describing {resource_type} ({id}): {message}")]
    ReadFailed {
        resource_type: String,
        id: String,
        message: String,
    },

    #[error("error updating {resource_type} ({id}) {group}: {message}")]
    UpdateFailed {
        resource_type: String,
        id: String,
        group: String,
        message: String,
    },

    #[error("error deleting {resource_type} ({id}): {message}")]
    DeleteFailed {
        resource_type: String,
        id: String,
        message: String,
    },

    #[error("timeout waiting for {resource_type} ({id}) deletion after {timeout:?}: {last_status}")]
    Timeout {
        resource_type: String,
        id: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("{resource_type} ({id}) must be replaced, {} cannot be updated in place", .fields.join(", "))]
    ReplacementRequired {
        resource_type: String,
        id: String,
        fields: Vec<String>,
    },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Whether the remote entity is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_violation() {
        let err = CloudError::Validation {
            resource_type: "input".to_string(),
            violations: vec![
                Violation::new("type", "expected one of [RTMP_PUSH], got \"HLS\""),
                Violation::new("name", "is required"),
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("invalid input configuration"));
        assert!(message.contains("type: expected one of"));
        assert!(message.contains("name: is required"));
    }

    #[test]
    fn test_update_failed_names_the_field_group() {
        let err = CloudError::UpdateFailed {
            resource_type: "input".to_string(),
            id: "1234".to_string(),
            group: "destinations".to_string(),
            message: "BadRequestException: stream name in use".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "error updating input (1234) destinations: BadRequestException: stream name in use"
        );
    }

    #[test]
    fn test_replacement_lists_fields() {
        let err = CloudError::ReplacementRequired {
            resource_type: "input".to_string(),
            id: "1234".to_string(),
            fields: vec!["type".to_string(), "vpc".to_string()],
        };

        assert!(err.to_string().contains("type, vpc cannot be updated in place"));
    }
}
