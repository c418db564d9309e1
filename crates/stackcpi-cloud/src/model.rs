//! Resource models observed on the backend
//!
//! These mirror what the compute, block-storage, network and load-balancer
//! APIs report. They are snapshots: nothing here is cached between calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// String-keyed metadata as stored on servers, volumes and snapshots
pub type Metadata = HashMap<String, String>;

/// Compute server (VM)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,

    pub name: String,

    pub status: ServerStatus,

    /// Flavor the server was booted with
    pub flavor_id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub availability_zone: Option<String>,
}

/// Server status as reported by the compute API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerStatus {
    Active,
    Build,
    Reboot,
    HardReboot,
    Shutoff,
    Error,
    Deleted,
    Terminated,
    Other(String),
}

impl ServerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ServerStatus::Active => "ACTIVE",
            ServerStatus::Build => "BUILD",
            ServerStatus::Reboot => "REBOOT",
            ServerStatus::HardReboot => "HARD_REBOOT",
            ServerStatus::Shutoff => "SHUTOFF",
            ServerStatus::Error => "ERROR",
            ServerStatus::Deleted => "DELETED",
            ServerStatus::Terminated => "TERMINATED",
            ServerStatus::Other(s) => s,
        }
    }

    /// Terminal states that count as "the server no longer exists"
    pub fn is_gone(&self) -> bool {
        matches!(self, ServerStatus::Deleted | ServerStatus::Terminated)
    }
}

impl From<&str> for ServerStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ACTIVE" => ServerStatus::Active,
            "BUILD" => ServerStatus::Build,
            "REBOOT" => ServerStatus::Reboot,
            "HARD_REBOOT" => ServerStatus::HardReboot,
            "SHUTOFF" => ServerStatus::Shutoff,
            "ERROR" => ServerStatus::Error,
            "DELETED" => ServerStatus::Deleted,
            "TERMINATED" => ServerStatus::Terminated,
            _ => ServerStatus::Other(s.to_string()),
        }
    }
}

impl From<String> for ServerStatus {
    fn from(s: String) -> Self {
        ServerStatus::from(s.as_str())
    }
}

impl From<ServerStatus> for String {
    fn from(status: ServerStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block storage volume (disk)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,

    pub name: String,

    /// Size in GiB
    pub size_gib: u32,

    pub status: VolumeStatus,

    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,

    #[serde(default)]
    pub metadata: Metadata,

    pub availability_zone: Option<String>,
}

impl Volume {
    /// Attachment of this volume to the given server, if any
    pub fn attachment_to(&self, server_id: &str) -> Option<&VolumeAttachment> {
        self.attachments.iter().find(|a| a.server_id == server_id)
    }

    /// First attachment to any server other than the given one
    pub fn attachment_elsewhere(&self, server_id: &str) -> Option<&VolumeAttachment> {
        self.attachments.iter().find(|a| a.server_id != server_id)
    }

    pub fn device_paths(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.device.as_str()).collect()
    }
}

/// Volume status as reported by the block storage API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeStatus {
    Creating,
    Available,
    Attaching,
    InUse,
    Detaching,
    Extending,
    Deleting,
    Deleted,
    Error,
    Other(String),
}

impl VolumeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VolumeStatus::Creating => "creating",
            VolumeStatus::Available => "available",
            VolumeStatus::Attaching => "attaching",
            VolumeStatus::InUse => "in-use",
            VolumeStatus::Detaching => "detaching",
            VolumeStatus::Extending => "extending",
            VolumeStatus::Deleting => "deleting",
            VolumeStatus::Deleted => "deleted",
            VolumeStatus::Error => "error",
            VolumeStatus::Other(s) => s,
        }
    }
}

impl From<&str> for VolumeStatus {
    fn from(s: &str) -> Self {
        match s {
            "creating" => VolumeStatus::Creating,
            "available" => VolumeStatus::Available,
            "attaching" => VolumeStatus::Attaching,
            "in-use" => VolumeStatus::InUse,
            "detaching" => VolumeStatus::Detaching,
            "extending" => VolumeStatus::Extending,
            "deleting" => VolumeStatus::Deleting,
            "deleted" => VolumeStatus::Deleted,
            "error" => VolumeStatus::Error,
            _ => VolumeStatus::Other(s.to_string()),
        }
    }
}

impl From<String> for VolumeStatus {
    fn from(s: String) -> Self {
        VolumeStatus::from(s.as_str())
    }
}

impl From<VolumeStatus> for String {
    fn from(status: VolumeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relation between a volume and the server it is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    pub volume_id: String,

    pub server_id: String,

    /// Device path chosen by the backend, e.g. `/dev/sdc`
    pub device: String,
}

/// Volume snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,

    pub name: String,

    pub volume_id: String,

    pub status: SnapshotStatus,

    pub description: String,

    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SnapshotStatus {
    Creating,
    Available,
    Deleting,
    Deleted,
    Error,
    Other(String),
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SnapshotStatus::Creating => "creating",
            SnapshotStatus::Available => "available",
            SnapshotStatus::Deleting => "deleting",
            SnapshotStatus::Deleted => "deleted",
            SnapshotStatus::Error => "error",
            SnapshotStatus::Other(s) => s,
        }
    }
}

impl From<&str> for SnapshotStatus {
    fn from(s: &str) -> Self {
        match s {
            "creating" => SnapshotStatus::Creating,
            "available" => SnapshotStatus::Available,
            "deleting" => SnapshotStatus::Deleting,
            "deleted" => SnapshotStatus::Deleted,
            "error" => SnapshotStatus::Error,
            _ => SnapshotStatus::Other(s.to_string()),
        }
    }
}

impl From<String> for SnapshotStatus {
    fn from(s: String) -> Self {
        SnapshotStatus::from(s.as_str())
    }
}

impl From<SnapshotStatus> for String {
    fn from(status: SnapshotStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend-defined sizing template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,

    pub name: String,

    pub vcpus: u32,

    pub ram_mib: u32,

    /// Root disk size in GiB
    pub disk_gib: u32,

    /// Ephemeral disk size in GiB (0 = none)
    pub ephemeral_gib: u32,

    /// Swap size in MiB (0 = none)
    pub swap_mib: u32,
}

impl Flavor {
    pub fn has_ephemeral_disk(&self) -> bool {
        self.ephemeral_gib > 0
    }

    pub fn has_swap_disk(&self) -> bool {
        self.swap_mib > 0
    }
}

/// Network port created for a manual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,

    pub network_id: String,

    pub ip_address: Option<String>,

    pub mac_address: Option<String>,
}

/// Load-balancer backend pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,

    pub name: String,
}

/// Registration of a server address in a load-balancer pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    pub id: String,

    pub pool_id: String,

    pub address: String,

    pub protocol_port: u16,
}
