//! CPI entry point
//!
//! [`Cpi`] owns the validated configuration and the service factory. Each
//! lifecycle operation is an `impl Cpi` block in its own module and builds
//! fresh service handles when it starts.

use crate::error::{CloudResultExt, Result};
use serde::{Deserialize, Serialize};
use stackcpi_cloud::{
    ComputeService, ImageService, LoadBalancerService, NetworkService, ServiceFactory,
    StatusWaiter, VolumeService,
};
use stackcpi_config::CpiConfig;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Version of the caller-facing CPI contract
pub const API_VERSION: u32 = 2;

/// Stemcell formats this CPI can boot
pub const STEMCELL_FORMATS: &[&str] = &["openstack-raw", "openstack-qcow2", "openstack-light"];

/// Capabilities reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub stemcell_formats: Vec<String>,
    pub api_version: u32,
}

/// Orchestrates one CPI operation at a time against an OpenStack backend
pub struct Cpi {
    factory: Arc<dyn ServiceFactory>,
    config: CpiConfig,
}

impl Cpi {
    pub fn new(factory: Arc<dyn ServiceFactory>, config: CpiConfig) -> Self {
        Self { factory, config }
    }

    /// Build a CPI from a config file on disk
    pub fn from_config_file(
        factory: Arc<dyn ServiceFactory>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let config = CpiConfig::load(path)?;
        tracing::debug!("Loaded CPI config for {}", config.credentials.auth_url);
        Ok(Self::new(factory, config))
    }

    pub fn config(&self) -> &CpiConfig {
        &self.config
    }

    pub fn info(&self) -> Info {
        Info {
            stemcell_formats: STEMCELL_FORMATS.iter().map(|f| f.to_string()).collect(),
            api_version: API_VERSION,
        }
    }

    /// Poller bounded by the configured state timeout
    pub(crate) fn waiter(&self) -> StatusWaiter {
        StatusWaiter::new(self.config.state_timeout, self.config.poll_interval)
    }

    /// Run a remote call under the retry policy for `operation`
    pub(crate) async fn retry<T, F, Fut>(&self, operation: &str, f: F) -> stackcpi_cloud::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = stackcpi_cloud::Result<T>>,
    {
        self.config.retry_policies.run(operation, f).await
    }

    pub(crate) async fn compute_service(&self) -> Result<Arc<dyn ComputeService>> {
        self.factory
            .compute()
            .await
            .with_context(|| "Failed to create compute service".to_string())
    }

    pub(crate) async fn network_service(&self) -> Result<Arc<dyn NetworkService>> {
        self.factory
            .network()
            .await
            .with_context(|| "Failed to create network service".to_string())
    }

    pub(crate) async fn image_service(&self) -> Result<Arc<dyn ImageService>> {
        self.factory
            .image()
            .await
            .with_context(|| "Failed to create image service".to_string())
    }

    pub(crate) async fn volume_service(&self) -> Result<Arc<dyn VolumeService>> {
        self.factory
            .volume()
            .await
            .with_context(|| "Failed to create volume service".to_string())
    }

    pub(crate) async fn load_balancer_service(&self) -> Result<Arc<dyn LoadBalancerService>> {
        self.factory
            .load_balancer()
            .await
            .with_context(|| "Failed to create load balancer service".to_string())
    }
}
