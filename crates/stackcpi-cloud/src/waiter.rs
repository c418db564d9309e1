//! ステータス待機モジュール
//!
//! リソースの種類には関知せず、呼び出し側が渡すアクセサで現在の
//! ステータスを取得し、一致するかタイムアウトするまで一定間隔で繰り返す。

use crate::error::{CloudError, Result};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// ステータス取得のデフォルト間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// ステータス遷移のデフォルト上限
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(300);

/// 固定間隔のステータスポーラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWaiter {
    timeout: Duration,
    interval: Duration,
}

impl Default for StatusWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl StatusWaiter {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `fetch` が `target` を返すまで待機
    ///
    /// 取得エラーでは待機を終えず、最後のエラーをタイムアウトエラーに添付する。
    ///
    /// # Arguments
    /// * `resource` - ログとエラーに使うリソース名（例: `volume 1234`）
    /// * `target` - 待機するステータス
    /// * `fetch` - 現在のステータスを返す
    pub async fn wait_for<S, F, Fut>(&self, resource: &str, target: S, mut fetch: F) -> Result<()>
    where
        S: PartialEq + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let started = Instant::now();
        let mut last_error: Option<CloudError> = None;

        loop {
            match fetch().await {
                Ok(status) if status == target => {
                    tracing::debug!(
                        "{} reached '{}' after {:?}",
                        resource,
                        target,
                        started.elapsed()
                    );
                    return Ok(());
                }
                Ok(status) => {
                    tracing::debug!("{} is '{}', waiting for '{}'", resource, status, target);
                }
                Err(e) => {
                    tracing::debug!("Failed to fetch status of {}: {}", resource, e);
                    last_error = Some(e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(CloudError::WaitTimeout {
                    resource: resource.to_string(),
                    target: target.to_string(),
                    elapsed,
                    last_error: last_error.map(Box::new),
                });
            }

            sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }
}
