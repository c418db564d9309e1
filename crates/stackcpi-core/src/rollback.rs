//! Compensating cleanup for a failed VM provisioning
//!
//! Resources are recorded as they are created. On failure the tracker
//! deletes ports first, then the server. Cleanup errors are logged and
//! dropped so the caller only sees the error that triggered the rollback.

use stackcpi_cloud::{ComputeService, NetworkService, Port};
use std::sync::Arc;

pub(crate) struct ProvisionRollback {
    compute: Arc<dyn ComputeService>,
    network: Arc<dyn NetworkService>,
    ports: Vec<Port>,
    server_id: Option<String>,
}

impl ProvisionRollback {
    pub(crate) fn new(compute: Arc<dyn ComputeService>, network: Arc<dyn NetworkService>) -> Self {
        Self {
            compute,
            network,
            ports: Vec::new(),
            server_id: None,
        }
    }

    pub(crate) fn track_port(&mut self, port: Port) {
        self.ports.push(port);
    }

    pub(crate) fn track_server(&mut self, server_id: &str) {
        self.server_id = Some(server_id.to_string());
    }

    /// Best-effort delete of everything tracked so far
    pub(crate) async fn unwind(self) {
        if !self.ports.is_empty() {
            let port_ids: Vec<&str> = self.ports.iter().map(|p| p.id.as_str()).collect();
            match self.network.delete_ports(&self.ports).await {
                Ok(()) => tracing::info!("Rolled back ports {:?}", port_ids),
                Err(e) => tracing::warn!("Failed to clean up ports {:?}: {}", port_ids, e),
            }
        }

        if let Some(server_id) = &self.server_id {
            match self.compute.delete_server(server_id).await {
                Ok(()) => tracing::info!("Rolled back server {}", server_id),
                Err(e) => tracing::warn!("Failed to clean up server {}: {}", server_id, e),
            }
        }
    }
}
