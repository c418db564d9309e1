mod common;

use common::{PLAIN_FLAVOR, TestCloud, caller_metadata};
use serde_json::json;
use stackcpi_core::CpiError;

fn cloud_with_disk() -> TestCloud {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", PLAIN_FLAVOR);
    cloud.fake.add_volume("disk-1", 5);
    cloud
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_description_includes_device() {
    let cloud = cloud_with_disk();
    cloud.fake.add_attachment("disk-1", "vm-1", "a/b/c");

    let snapshot_id = cloud
        .cpi
        .snapshot_disk(
            "disk-1",
            &caller_metadata(json!({"deployment": "d", "job": "j", "index": 1})),
        )
        .await
        .unwrap();

    let snapshot = cloud.fake.snapshot(&snapshot_id).unwrap();
    assert_eq!(snapshot.description, "d/j/1/c");
    assert_eq!(snapshot.volume_id, "disk-1");
    assert!(snapshot.name.starts_with("snapshot-"));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_metadata_is_rewritten() {
    let cloud = cloud_with_disk();

    let snapshot_id = cloud
        .cpi
        .snapshot_disk(
            "disk-1",
            &caller_metadata(json!({
                "director_name": "bosh-1",
                "deployment": "cf",
                "job": "router",
                "index": 0,
                "instance_id": "9f2c",
                "agent_id": null
            })),
        )
        .await
        .unwrap();

    let snapshot = cloud.fake.snapshot(&snapshot_id).unwrap();
    assert_eq!(snapshot.description, "cf/router/0");

    let metadata = &snapshot.metadata;
    assert_eq!(metadata.get("director").map(String::as_str), Some("bosh-1"));
    assert_eq!(metadata.get("instance_index").map(String::as_str), Some("0"));
    assert_eq!(
        metadata.get("instance_name").map(String::as_str),
        Some("router/9f2c")
    );
    for removed in ["director_name", "index", "job", "agent_id"] {
        assert!(!metadata.contains_key(removed), "{} should be removed", removed);
    }
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_without_metadata_uses_placeholders() {
    let cloud = cloud_with_disk();

    let snapshot_id = cloud
        .cpi
        .snapshot_disk("disk-1", &caller_metadata(json!({})))
        .await
        .unwrap();

    let snapshot = cloud.fake.snapshot(&snapshot_id).unwrap();
    assert_eq!(
        snapshot.description,
        "deployment-not-set/job-not-set/index-not-set"
    );
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_missing_disk() {
    let cloud = cloud_with_disk();

    let err = cloud
        .cpi
        .snapshot_disk("disk-9", &caller_metadata(json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, CpiError::NotFound { kind: "disk", .. }));
    assert_eq!(cloud.fake.call_count("create_snapshot"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_backend_failure_names_disk() {
    let cloud = cloud_with_disk();
    cloud.fake.fail("create_snapshot");

    let err = cloud
        .cpi
        .snapshot_disk("disk-1", &caller_metadata(json!({})))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("disk-1"));
    assert!(err.to_string().contains("injected create_snapshot failure"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_snapshot() {
    let cloud = cloud_with_disk();
    cloud.fake.add_snapshot("snap-1", "disk-1");

    cloud.cpi.delete_snapshot("snap-1").await.unwrap();

    assert!(cloud.fake.snapshot("snap-1").is_none());
    assert_eq!(cloud.fake.call_count("delete_snapshot"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_missing_snapshot_is_skipped() {
    let cloud = cloud_with_disk();

    cloud.cpi.delete_snapshot("snap-9").await.unwrap();

    assert_eq!(cloud.fake.call_count("get_snapshot"), 0);
}
