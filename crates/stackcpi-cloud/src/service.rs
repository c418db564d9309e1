//! Collaborator service traits
//!
//! Each OpenStack capability is a narrow trait. The orchestration core only
//! talks to these; REST encoding and authentication live behind them.

use crate::error::Result;
use crate::model::{
    Flavor, Metadata, Pool, PoolMember, Port, Server, Snapshot, Volume, VolumeAttachment,
};
use crate::network::{Network, NetworkConfig, NetworkSpec};
use crate::properties::{LoadBalancerPool, VmCloudProperties, VmResources};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Compute (servers, flavors, volume attachments)
#[async_trait]
pub trait ComputeService: Send + Sync {
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server>;

    /// Returns [`CloudError::NotFound`](crate::CloudError::NotFound) when the server does not exist
    async fn get_server(&self, server_id: &str) -> Result<Server>;

    async fn delete_server(&self, server_id: &str) -> Result<()>;

    async fn list_volume_attachments(&self, server_id: &str) -> Result<Vec<VolumeAttachment>>;

    async fn attach_volume(
        &self,
        server_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<VolumeAttachment>;

    async fn detach_volume(&self, server_id: &str, volume_id: &str) -> Result<()>;

    async fn get_flavor_by_id(&self, flavor_id: &str) -> Result<Flavor>;

    /// Smallest flavor satisfying the given resources
    async fn get_matching_flavor(
        &self,
        resources: &VmResources,
        boot_from_volume: bool,
    ) -> Result<Flavor>;

    async fn get_metadata(&self, server_id: &str) -> Result<Metadata>;

    async fn update_server_metadata(&self, server_id: &str, metadata: &Metadata) -> Result<()>;

    async fn delete_server_metadata(&self, server_id: &str, keys: &[String]) -> Result<()>;

    /// Rename a server
    async fn update_server(&self, server_id: &str, name: &str) -> Result<()>;

    /// Soft reboot
    async fn reboot_server(&self, server_id: &str) -> Result<()>;

    async fn get_server_az(&self, server_id: &str) -> Result<String>;
}

/// Networking (ports, VIPs, subnets)
#[async_trait]
pub trait NetworkService: Send + Sync {
    /// Resolve default, manual and VIP networks from the caller's spec
    async fn get_network_configuration(
        &self,
        spec: &NetworkSpec,
        cloud_properties: &VmCloudProperties,
    ) -> Result<NetworkConfig>;

    async fn create_port(&self, network: &Network, security_groups: &[String]) -> Result<Port>;

    async fn get_ports(&self, server_id: &str) -> Result<Vec<Port>>;

    async fn delete_ports(&self, ports: &[Port]) -> Result<()>;

    async fn configure_vip_network(&self, server_id: &str, vip_network: &Network) -> Result<()>;

    async fn get_subnet_id(&self, network_id: &str) -> Result<String>;
}

/// Image catalog
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Returns the image id once the image is confirmed active
    async fn get_image(&self, image_id: &str) -> Result<String>;
}

/// Block storage (volumes and snapshots)
#[async_trait]
pub trait VolumeService: Send + Sync {
    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume>;

    async fn get_volume(&self, volume_id: &str) -> Result<Volume>;

    async fn delete_volume(&self, volume_id: &str) -> Result<()>;

    async fn extend_volume_size(&self, volume_id: &str, new_size_gib: u32) -> Result<()>;

    async fn set_volume_metadata(&self, volume_id: &str, metadata: &Metadata) -> Result<()>;

    async fn create_snapshot(&self, request: &CreateSnapshotRequest) -> Result<Snapshot>;

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Snapshot>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

/// Load balancer pools and members
#[async_trait]
pub trait LoadBalancerService: Send + Sync {
    async fn get_pool(&self, name: &str) -> Result<Pool>;

    async fn create_pool_member(
        &self,
        pool: &Pool,
        ip: &str,
        pool_properties: &LoadBalancerPool,
        subnet_id: &str,
        timeout: Duration,
    ) -> Result<PoolMember>;

    async fn delete_pool_member(
        &self,
        pool_id: &str,
        member_id: &str,
        timeout: Duration,
    ) -> Result<()>;
}

/// Builds service handles for one operation
///
/// Building may authenticate or discover endpoints, so each call can fail.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn compute(&self) -> Result<Arc<dyn ComputeService>>;

    async fn network(&self) -> Result<Arc<dyn NetworkService>>;

    async fn image(&self) -> Result<Arc<dyn ImageService>>;

    async fn volume(&self) -> Result<Arc<dyn VolumeService>>;

    async fn load_balancer(&self) -> Result<Arc<dyn LoadBalancerService>>;
}

/// Everything needed to boot a server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,

    pub image_id: String,

    pub cloud_properties: VmCloudProperties,

    pub availability_zone: Option<String>,

    pub network_config: NetworkConfig,

    /// Existing disks the VM should be placed near
    pub disk_ids: Vec<String>,

    pub agent_id: String,

    /// Opaque environment handed to the agent
    pub environment: serde_json::Value,

    pub config_drive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,

    pub size_gib: u32,

    pub volume_type: Option<String>,

    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub volume_id: String,

    /// Snapshot even while the volume is attached
    pub force: bool,

    pub name: String,

    pub description: String,

    pub metadata: Metadata,
}
