//! Volume snapshots

use crate::cpi::Cpi;
use crate::error::{CloudResultExt, CpiError, Result};
use crate::metadata::{self, CallerMetadata};
use stackcpi_cloud::{CreateSnapshotRequest, SnapshotStatus};
use uuid::Uuid;

impl Cpi {
    /// Snapshot a volume, attached or not, and wait until it is available
    ///
    /// Returns the snapshot id.
    pub async fn snapshot_disk(&self, disk_id: &str, metadata: &CallerMetadata) -> Result<String> {
        let volume_service = self.volume_service().await?;
        let volumes = volume_service.as_ref();

        let volume = volumes
            .get_volume(disk_id)
            .await
            .or_not_found("disk", disk_id)?;
        let devices = volume.device_paths();

        let metadata = metadata::to_string_metadata(metadata);
        let description = metadata::snapshot_description(&metadata, &devices);

        let request = CreateSnapshotRequest {
            volume_id: disk_id.to_string(),
            force: true,
            name: format!("snapshot-{}", Uuid::new_v4()),
            description,
            metadata: metadata::snapshot_metadata(metadata),
        };

        tracing::info!(
            "Creating snapshot {} of volume {} ({})",
            request.name,
            disk_id,
            request.description
        );
        let snapshot = volumes
            .create_snapshot(&request)
            .await
            .with_context(|| format!("Failed to create snapshot of volume '{}'", disk_id))?;

        let snapshot_id = snapshot.id.as_str();
        self.waiter()
            .wait_for(
                &format!("snapshot {}", snapshot_id),
                SnapshotStatus::Available,
                move || async move { volumes.get_snapshot(snapshot_id).await.map(|s| s.status) },
            )
            .await
            .with_context(|| {
                format!("Failed waiting for snapshot '{}' to become available", snapshot_id)
            })?;

        Ok(snapshot.id)
    }

    /// Delete a snapshot and wait until it is gone
    ///
    /// A snapshot that no longer exists is skipped.
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let volume_service = self.volume_service().await?;
        let volumes = volume_service.as_ref();

        match volumes.delete_snapshot(snapshot_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("Snapshot {} not found, skipping delete", snapshot_id);
                return Ok(());
            }
            Err(e) => {
                return Err(CpiError::cloud(
                    format!("Failed to delete snapshot '{}'", snapshot_id),
                    e,
                ));
            }
        }

        self.waiter()
            .wait_for(
                &format!("snapshot {}", snapshot_id),
                SnapshotStatus::Deleted,
                move || async move {
                    match volumes.get_snapshot(snapshot_id).await {
                        Ok(snapshot) => Ok(snapshot.status),
                        Err(e) if e.is_not_found() => Ok(SnapshotStatus::Deleted),
                        Err(e) => Err(e),
                    }
                },
            )
            .await
            .with_context(|| format!("Failed waiting for snapshot '{}' to be deleted", snapshot_id))?;

        tracing::info!("Deleted snapshot {}", snapshot_id);
        Ok(())
    }
}
