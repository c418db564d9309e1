//! Orchestration error types

use stackcpi_cloud::CloudError;
use stackcpi_config::ConfigError;
use thiserror::Error;

/// Errors returned to the caller of a CPI operation
///
/// Each variant renders as one descriptive chain naming the operation, the
/// resource id and the underlying cause.
#[derive(Error, Debug)]
pub enum CpiError {
    /// Request rejected before any remote call
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Resource is in a state that forbids the operation
    #[error("{0}")]
    Conflict(String),

    /// A resource the operation depends on does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Failed to get device letter: every device name on server '{server_id}' is in use")]
    NoFreeDeviceLetter { server_id: String },

    #[error("{context}: {source}")]
    Cloud {
        context: String,
        #[source]
        source: CloudError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CpiError {
    pub(crate) fn cloud(context: impl Into<String>, source: CloudError) -> Self {
        CpiError::Cloud {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            CpiError::NotFound { .. } => true,
            CpiError::Cloud { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CpiError::Cloud { source, .. } if source.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, CpiError>;

/// Context helpers for collaborator results
pub(crate) trait CloudResultExt<T> {
    /// Wrap any error with a description of what was being done
    fn with_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Like [`with_context`](Self::with_context), but absence becomes [`CpiError::NotFound`]
    fn or_not_found(self, kind: &'static str, id: &str) -> Result<T>;
}

impl<T> CloudResultExt<T> for std::result::Result<T, CloudError> {
    fn with_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| CpiError::Cloud {
            context: context(),
            source,
        })
    }

    fn or_not_found(self, kind: &'static str, id: &str) -> Result<T> {
        self.map_err(|source| {
            if source.is_not_found() {
                CpiError::NotFound {
                    kind,
                    id: id.to_string(),
                }
            } else {
                CpiError::Cloud {
                    context: format!("Failed to get {} '{}'", kind, id),
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_not_found_maps_absence() {
        let result: std::result::Result<(), CloudError> =
            Err(CloudError::not_found("volume", "v-1"));
        let err = result.or_not_found("disk", "v-1").unwrap_err();
        assert!(matches!(err, CpiError::NotFound { kind: "disk", .. }));
        assert_eq!(err.to_string(), "disk 'v-1' not found");
    }

    #[test]
    fn test_with_context_keeps_cause_in_message() {
        let result: std::result::Result<(), CloudError> =
            Err(CloudError::ApiError("quota exceeded".to_string()));
        let err = result
            .with_context(|| "Failed to create port on network 'private'".to_string())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to create port on network 'private': API error: quota exceeded"
        );
        assert!(!err.is_not_found());
    }
}
