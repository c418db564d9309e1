//! stackcpi Core
//!
//! VM and disk lifecycle orchestration for an OpenStack-compatible cloud.
//! Every operation is a method on [`Cpi`]; each builds its service handles
//! from the [`ServiceFactory`](stackcpi_cloud::ServiceFactory), runs its
//! workflow to completion and returns a typed result or a [`CpiError`].
//!
//! ```text
//! create_vm ──► image ──► network config ──► ports ──► server ──► VIP ──► pools ──► tags
//!                                              └──────── rollback on failure ────────┘
//! attach_disk ──► volume checks ──► device letter ──► attach ──► poll in-use
//! ```

pub mod cpi;
pub mod device;
pub mod disk;
pub mod error;
pub mod metadata;
mod rollback;
pub mod snapshot;
pub mod vm;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cpi::{API_VERSION, Cpi, Info, STEMCELL_FORMATS};
pub use disk::{DiskHint, MIN_DISK_SIZE_MIB};
pub use error::{CpiError, Result};
pub use metadata::CallerMetadata;
pub use vm::{CalculatedVmProperties, CreateVmRequest, CreatedVm};
