//! Cloud-specific properties passed through by the caller

use serde::{Deserialize, Serialize};

/// VM cloud properties (`instance_type`, placement, load-balancer bindings)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmCloudProperties {
    pub instance_type: String,

    pub availability_zone: Option<String>,

    /// Candidate zones; one is picked per VM when non-empty
    #[serde(default)]
    pub availability_zones: Vec<String>,

    #[serde(default)]
    pub loadbalancer_pools: Vec<LoadBalancerPool>,

    pub boot_from_volume: Option<bool>,

    pub root_disk: Option<RootDisk>,

    pub key_name: Option<String>,
}

/// Binding of a VM to a named load-balancer pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerPool {
    pub name: String,

    pub port: u16,

    pub monitoring_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDisk {
    /// Size in GiB
    pub size: u32,
}

/// Disk cloud properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCloudProperties {
    #[serde(rename = "type")]
    pub volume_type: Option<String>,
}

/// Abstract VM resource requirements used to pick a flavor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmResources {
    pub cpu: u32,

    /// Memory in MiB
    pub ram: u32,

    /// Ephemeral disk size in MiB
    pub ephemeral_disk_size: u32,
}
