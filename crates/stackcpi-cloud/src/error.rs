//! Collaborator error types

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the compute, network, image, volume and load-balancer
/// collaborators.
///
/// Backends represent absence differently (HTTP 404, an empty lookup, an
/// explicit sentinel). Every implementation maps that onto
/// [`CloudError::NotFound`] so callers only ever ask [`CloudError::is_not_found`].
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Timed out after {}s waiting for {} to become '{}'{}",
        .elapsed.as_secs(),
        .resource,
        .target,
        last_error_suffix(.last_error)
    )]
    WaitTimeout {
        resource: String,
        target: String,
        elapsed: Duration,
        #[source]
        last_error: Option<Box<CloudError>>,
    },
}

impl CloudError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error means the resource does not exist on the backend
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::WaitTimeout { .. })
    }
}

fn last_error_suffix(last_error: &Option<Box<CloudError>>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
