//! Disk lifecycle: create, attach, detach, resize, delete
//!
//! Volume status only changes on the backend. Every transition issued here
//! is followed by polling the volume until the expected status is observed.

use crate::cpi::Cpi;
use crate::device;
use crate::error::{CloudResultExt, CpiError, Result};
use crate::metadata::{self, CallerMetadata};
use serde::{Deserialize, Serialize};
use stackcpi_cloud::{CreateVolumeRequest, DiskCloudProperties, VolumeService, VolumeStatus};
use uuid::Uuid;

/// Smallest disk the caller may request, in MiB
pub const MIN_DISK_SIZE_MIB: u32 = 1024;

/// Where an attached disk shows up inside the VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskHint {
    pub path: String,
}

enum AttachOutcome {
    /// The disk was already attached to the VM at this device
    AlreadyAttached(String),
    Attached,
}

impl Cpi {
    /// Create a volume and wait until it is available
    ///
    /// `size_mib` is rounded up to whole GiB. When `vm_id` is given the
    /// volume is created in the VM's availability zone unless
    /// `ignore_server_availability_zone` is set.
    pub async fn create_disk(
        &self,
        size_mib: u32,
        cloud_properties: &DiskCloudProperties,
        vm_id: Option<&str>,
    ) -> Result<String> {
        if size_mib < MIN_DISK_SIZE_MIB {
            return Err(CpiError::Validation("Minimum disk size is 1 GiB".to_string()));
        }

        let volume_service = self.volume_service().await?;
        let volumes = volume_service.as_ref();

        let availability_zone = match vm_id {
            Some(vm_id) if !self.config().ignore_server_availability_zone => {
                let compute = self.compute_service().await?;
                let zone = compute
                    .get_server_az(vm_id)
                    .await
                    .with_context(|| format!("Failed to get availability zone of VM '{}'", vm_id))?;
                Some(zone)
            }
            _ => None,
        };

        let request = CreateVolumeRequest {
            name: format!("volume-{}", Uuid::new_v4()),
            size_gib: size_mib.div_ceil(1024),
            volume_type: cloud_properties
                .volume_type
                .clone()
                .or_else(|| self.config().default_volume_type.clone()),
            availability_zone,
        };
        let volume = volumes
            .create_volume(&request)
            .await
            .with_context(|| format!("Failed to create volume of {} GiB", request.size_gib))?;
        tracing::info!("Created volume {} ({} GiB)", volume.id, volume.size_gib);

        self.wait_for_volume(volumes, &volume.id, VolumeStatus::Available)
            .await?;
        Ok(volume.id)
    }

    /// Delete an available volume
    ///
    /// A volume that no longer exists is skipped.
    pub async fn delete_disk(&self, disk_id: &str) -> Result<()> {
        let volume_service = self.volume_service().await?;
        let volumes = volume_service.as_ref();

        let volume = match volumes.get_volume(disk_id).await {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                tracing::info!("Volume {} not found, skipping delete", disk_id);
                return Ok(());
            }
            Err(e) => {
                return Err(CpiError::cloud(format!("Failed to get volume '{}'", disk_id), e));
            }
        };

        if volume.status != VolumeStatus::Available {
            return Err(CpiError::Conflict(format!(
                "Cannot delete volume '{}', state is '{}'",
                disk_id, volume.status
            )));
        }

        volumes
            .delete_volume(disk_id)
            .await
            .with_context(|| format!("Failed to delete volume '{}'", disk_id))?;

        self.wait_for_volume(volumes, disk_id, VolumeStatus::Deleted)
            .await?;
        tracing::info!("Deleted volume {}", disk_id);
        Ok(())
    }

    /// Whether the volume exists
    pub async fn has_disk(&self, disk_id: &str) -> Result<bool> {
        let volumes = self.volume_service().await?;
        match volumes.get_volume(disk_id).await {
            Ok(volume) if volume.status == VolumeStatus::Deleted => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(CpiError::cloud(format!("Failed to get volume '{}'", disk_id), e)),
        }
    }

    /// Ids of the volumes attached to a VM
    pub async fn get_disks(&self, vm_id: &str) -> Result<Vec<String>> {
        let compute = self.compute_service().await?;
        let attachments = compute
            .list_volume_attachments(vm_id)
            .await
            .or_not_found("VM", vm_id)?;
        Ok(attachments.into_iter().map(|a| a.volume_id).collect())
    }

    pub async fn set_disk_metadata(&self, disk_id: &str, metadata: &CallerMetadata) -> Result<()> {
        let volumes = self.volume_service().await?;
        let metadata = metadata::to_string_metadata(metadata);
        volumes
            .set_volume_metadata(disk_id, &metadata)
            .await
            .or_not_found("disk", disk_id)
    }

    /// Attach a volume to a VM
    ///
    /// Attaching a disk that is already attached to the same VM succeeds
    /// without touching the backend.
    pub async fn attach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        self.attach_volume(vm_id, disk_id).await.map(|_| ())
    }

    /// Attach a volume and report the device path the backend chose
    pub async fn attach_disk_v2(&self, vm_id: &str, disk_id: &str) -> Result<DiskHint> {
        if let AttachOutcome::AlreadyAttached(path) = self.attach_volume(vm_id, disk_id).await? {
            return Ok(DiskHint { path });
        }

        // The requested letter is only a hint to the backend; read back the real one.
        let volumes = self.volume_service().await?;
        let volume = volumes
            .get_volume(disk_id)
            .await
            .or_not_found("disk", disk_id)?;
        let attachment = volume
            .attachment_to(vm_id)
            .ok_or_else(|| CpiError::NotFound {
                kind: "attachment",
                id: format!("{} on VM {}", disk_id, vm_id),
            })?;

        Ok(DiskHint {
            path: attachment.device.clone(),
        })
    }

    async fn attach_volume(&self, vm_id: &str, disk_id: &str) -> Result<AttachOutcome> {
        let compute_service = self.compute_service().await?;
        let volume_service = self.volume_service().await?;
        let compute = compute_service.as_ref();
        let volumes = volume_service.as_ref();

        let volume = volumes
            .get_volume(disk_id)
            .await
            .or_not_found("disk", disk_id)?;

        if let Some(other) = volume.attachment_elsewhere(vm_id) {
            return Err(CpiError::Conflict(format!(
                "Volume '{}' is attached to another VM '{}'",
                disk_id, other.server_id
            )));
        }

        if let Some(existing) = volume.attachment_to(vm_id) {
            tracing::info!(
                "Volume {} is already attached to VM {} at {}",
                disk_id,
                vm_id,
                existing.device
            );
            return Ok(AttachOutcome::AlreadyAttached(existing.device.clone()));
        }

        if volume.status != VolumeStatus::Available {
            return Err(CpiError::Conflict(format!(
                "Cannot attach volume '{}', state is '{}'",
                disk_id, volume.status
            )));
        }

        let server = compute.get_server(vm_id).await.or_not_found("VM", vm_id)?;
        let flavor = compute
            .get_flavor_by_id(&server.flavor_id)
            .await
            .with_context(|| format!("Failed to get flavor '{}'", server.flavor_id))?;
        let attachments = compute
            .list_volume_attachments(vm_id)
            .await
            .with_context(|| format!("Failed to list volume attachments of VM '{}'", vm_id))?;

        let letter = device::next_device_letter(
            &flavor,
            self.config().config_drive,
            attachments.iter().map(|a| a.device.as_str()),
        )
        .ok_or_else(|| CpiError::NoFreeDeviceLetter {
            server_id: vm_id.to_string(),
        })?;
        let device_path = device::device_path(letter);
        let device_ref = device_path.as_str();

        tracing::info!("Attaching volume {} to VM {} at {}", disk_id, vm_id, device_path);
        self.retry("attach_volume", move || {
            compute.attach_volume(vm_id, disk_id, device_ref)
        })
        .await
        .with_context(|| format!("Failed to attach volume '{}' to VM '{}'", disk_id, vm_id))?;

        self.wait_for_volume(volumes, disk_id, VolumeStatus::InUse)
            .await?;
        Ok(AttachOutcome::Attached)
    }

    /// Detach a volume from a VM
    ///
    /// Detaching a disk the VM does not have attached is a no-op.
    pub async fn detach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        let compute_service = self.compute_service().await?;
        let volume_service = self.volume_service().await?;
        let compute = compute_service.as_ref();

        compute.get_server(vm_id).await.or_not_found("VM", vm_id)?;

        let attachments = compute
            .list_volume_attachments(vm_id)
            .await
            .with_context(|| format!("Failed to list volume attachments of VM '{}'", vm_id))?;
        if !attachments.iter().any(|a| a.volume_id == disk_id) {
            tracing::info!("Volume {} is not attached to VM {}, skipping", disk_id, vm_id);
            return Ok(());
        }

        tracing::info!("Detaching volume {} from VM {}", disk_id, vm_id);
        self.retry("detach_volume", move || compute.detach_volume(vm_id, disk_id))
            .await
            .with_context(|| format!("Failed to detach volume '{}' from VM '{}'", disk_id, vm_id))?;

        self.wait_for_volume(volume_service.as_ref(), disk_id, VolumeStatus::Available)
            .await
    }

    /// Grow a detached volume to `new_size_gib`
    pub async fn resize_disk(&self, disk_id: &str, new_size_gib: u32) -> Result<()> {
        let volume_service = self.volume_service().await?;
        let volumes = volume_service.as_ref();

        let volume = volumes
            .get_volume(disk_id)
            .await
            .or_not_found("disk", disk_id)?;

        if !volume.attachments.is_empty() {
            return Err(CpiError::Validation(format!(
                "Cannot resize volume '{}' due to attachments",
                disk_id
            )));
        }
        if new_size_gib < volume.size_gib {
            return Err(CpiError::Validation(format!(
                "Cannot resize volume '{}' to a smaller size from {} GiB to {} GiB",
                disk_id, volume.size_gib, new_size_gib
            )));
        }
        if new_size_gib == volume.size_gib {
            tracing::info!(
                "Volume {} is already {} GiB, skipping resize",
                disk_id,
                new_size_gib
            );
            return Ok(());
        }

        self.retry("extend_volume", move || {
            volumes.extend_volume_size(disk_id, new_size_gib)
        })
        .await
        .with_context(|| {
            format!("Failed to resize volume '{}' to {} GiB", disk_id, new_size_gib)
        })?;

        self.wait_for_volume(volumes, disk_id, VolumeStatus::Available)
            .await?;
        tracing::info!(
            "Resized volume {} from {} GiB to {} GiB",
            disk_id,
            volume.size_gib,
            new_size_gib
        );
        Ok(())
    }

    /// Poll a volume until it reports `target`
    ///
    /// When waiting for `deleted`, a volume that no longer exists counts as deleted.
    pub(crate) async fn wait_for_volume(
        &self,
        volumes: &dyn VolumeService,
        volume_id: &str,
        target: VolumeStatus,
    ) -> Result<()> {
        let gone_means_deleted = target == VolumeStatus::Deleted;
        let target_name = target.to_string();

        self.waiter()
            .wait_for(&format!("volume {}", volume_id), target, move || async move {
                match volumes.get_volume(volume_id).await {
                    Ok(volume) => Ok(volume.status),
                    Err(e) if gone_means_deleted && e.is_not_found() => Ok(VolumeStatus::Deleted),
                    Err(e) => Err(e),
                }
            })
            .await
            .with_context(|| {
                format!(
                    "Failed waiting for volume '{}' to become '{}'",
                    volume_id, target_name
                )
            })
    }
}
