//! stackcpi Cloud Collaborators
//!
//! This crate defines the contracts between the stackcpi orchestration core
//! and an OpenStack-compatible backend, plus the two primitives every
//! workflow leans on: the status waiter and per-operation retry policies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackcpi-core                    │
//! │      (create_vm, attach_disk, snapshot, ...)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackcpi-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Collaborator Traits              │   │
//! │  │  Compute / Network / Image / Volume / LB  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ StatusWaiter │  │RetryPolicies │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │   OpenStack   │
//!           │  REST clients │
//!           └───────────────┘
//! ```

pub mod error;
pub mod model;
pub mod network;
pub mod properties;
pub mod retry;
pub mod service;
pub mod waiter;

// Re-exports
pub use error::{CloudError, Result};
pub use model::{
    Flavor, Metadata, Pool, PoolMember, Port, Server, ServerStatus, Snapshot, SnapshotStatus,
    Volume, VolumeAttachment, VolumeStatus,
};
pub use network::{
    Network, NetworkCloudProperties, NetworkConfig, NetworkSettings, NetworkSpec, NetworkType,
};
pub use properties::{DiskCloudProperties, LoadBalancerPool, RootDisk, VmCloudProperties, VmResources};
pub use retry::{DEFAULT_POLICY, RetryConfig, RetryPolicies};
pub use service::{
    ComputeService, CreateServerRequest, CreateSnapshotRequest, CreateVolumeRequest,
    ImageService, LoadBalancerService, NetworkService, ServiceFactory, VolumeService,
};
pub use waiter::{DEFAULT_POLL_INTERVAL, DEFAULT_STATE_TIMEOUT, StatusWaiter};
