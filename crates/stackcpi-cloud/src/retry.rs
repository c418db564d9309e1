//! Per-operation retry policies
//!
//! Policies are keyed by operation name. Lookup falls back to the `default`
//! entry, then to [`RetryConfig::default`] (10 attempts, 3 seconds apart).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Key of the fallback policy
pub const DEFAULT_POLICY: &str = "default";

/// Retry configuration for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,

    /// Fixed sleep between attempts, in seconds
    pub sleep_duration: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            sleep_duration: 3,
        }
    }
}

impl RetryConfig {
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_duration)
    }
}

/// Retry policies keyed by operation name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryPolicies {
    policies: HashMap<String, RetryConfig>,
}

impl From<HashMap<String, RetryConfig>> for RetryPolicies {
    fn from(policies: HashMap<String, RetryConfig>) -> Self {
        Self { policies }
    }
}

impl RetryPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, operation: impl Into<String>, config: RetryConfig) -> Self {
        self.policies.insert(operation.into(), config);
        self
    }

    /// Resolve the policy for an operation
    pub fn resolve(&self, operation: &str) -> RetryConfig {
        self.policies
            .get(operation)
            .or_else(|| self.policies.get(DEFAULT_POLICY))
            .copied()
            .unwrap_or_default()
    }

    /// Run a remote call under the policy resolved for `operation`
    ///
    /// Not-found errors are returned immediately; they will not change on retry.
    /// When attempts are exhausted the last error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = self.resolve(operation);
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            "{} failed after {} attempts: {}",
                            operation,
                            attempt,
                            e
                        );
                        return Err(e);
                    }

                    tracing::info!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation,
                        attempt,
                        max_attempts,
                        e,
                        config.sleep()
                    );
                    tokio::time::sleep(config.sleep()).await;
                }
            }
        }
    }
}
