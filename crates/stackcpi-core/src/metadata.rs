//! Metadata conversion and derivation
//!
//! Callers hand over loosely typed JSON metadata; servers, volumes and
//! snapshots only store strings.

use crate::error::{CpiError, Result};
use serde_json::{Map, Value};
use stackcpi_cloud::Metadata;

/// Metadata as supplied by the caller
pub type CallerMetadata = Map<String, Value>;

/// Server metadata key prefix recording load-balancer pool memberships
pub const LBAAS_POOL_PREFIX: &str = "lbaas_pool_";

/// Convert caller metadata to strings
///
/// Null values and empty keys are dropped. Strings are kept verbatim; other
/// values use their JSON rendering (`1`, `true`).
pub fn to_string_metadata(metadata: &CallerMetadata) -> Metadata {
    metadata
        .iter()
        .filter(|(key, value)| !key.is_empty() && !value.is_null())
        .map(|(key, value)| (key.clone(), value_to_string(value)))
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A pool membership created while provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMembership {
    pub pool_id: String,
    pub member_id: String,
}

impl PoolMembership {
    /// Parse a `<pool_id>/<member_id>` tag value
    pub fn parse(value: &str) -> Option<Self> {
        let (pool_id, member_id) = value.split_once('/')?;
        if pool_id.is_empty() || member_id.is_empty() {
            return None;
        }
        Some(Self {
            pool_id: pool_id.to_string(),
            member_id: member_id.to_string(),
        })
    }

    pub fn tag_value(&self) -> String {
        format!("{}/{}", self.pool_id, self.member_id)
    }
}

/// Server tags for created memberships, keyed `lbaas_pool_1`, `lbaas_pool_2`, ...
pub fn pool_membership_tags(memberships: &[PoolMembership]) -> Metadata {
    memberships
        .iter()
        .enumerate()
        .map(|(i, m)| (format!("{}{}", LBAAS_POOL_PREFIX, i + 1), m.tag_value()))
        .collect()
}

/// Memberships recorded in the metadata of server `vm_id`, sorted by key
///
/// Keys without the `lbaas_pool_` prefix are ignored. A prefixed value that
/// is not `<pool_id>/<member_id>` fails the whole lookup.
pub fn pool_memberships(
    vm_id: &str,
    metadata: &Metadata,
) -> Result<Vec<(String, PoolMembership)>> {
    let mut memberships = metadata
        .iter()
        .filter(|(key, _)| key.starts_with(LBAAS_POOL_PREFIX))
        .map(|(key, value)| match PoolMembership::parse(value) {
            Some(membership) => Ok((key.clone(), membership)),
            None => Err(CpiError::Validation(format!(
                "Malformed pool membership '{}'='{}' on VM '{}', expected '<pool_id>/<member_id>'",
                key, value, vm_id
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    memberships.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(memberships)
}

fn field_or_not_set(metadata: &Metadata, field: &str) -> String {
    metadata
        .get(field)
        .cloned()
        .unwrap_or_else(|| format!("{}-not-set", field))
}

/// Snapshot description: `<deployment>/<job>/<index>[/<device>]`
///
/// The device part is the last path segment of the first device path.
pub fn snapshot_description(metadata: &Metadata, devices: &[&str]) -> String {
    let mut description = format!(
        "{}/{}/{}",
        field_or_not_set(metadata, "deployment"),
        field_or_not_set(metadata, "job"),
        field_or_not_set(metadata, "index"),
    );
    if let Some(device) = devices.first() {
        let segment = device.rsplit('/').next().unwrap_or_default();
        description.push('/');
        description.push_str(segment);
    }
    description
}

/// Rewrite deployment keys into the names stored on snapshots
///
/// `director_name` becomes `director`, `index` becomes `instance_index` and
/// `job` is folded into `instance_name` as `<job>/<instance_id>`.
pub fn snapshot_metadata(mut metadata: Metadata) -> Metadata {
    if let Some(director) = metadata.remove("director_name") {
        metadata.insert("director".to_string(), director);
    }
    if let Some(index) = metadata.remove("index") {
        metadata.insert("instance_index".to_string(), index);
    }
    if let Some(job) = metadata.remove("job") {
        let instance_id = field_or_not_set(&metadata, "instance_id");
        metadata.insert("instance_name".to_string(), format!("{}/{}", job, instance_id));
    }
    metadata
}

/// Human readable server name from deployment metadata
///
/// An explicit `name` wins; otherwise `<job>/<index>` when both are set.
pub fn server_name(metadata: &Metadata) -> Option<String> {
    if let Some(name) = metadata.get("name").filter(|n| !n.is_empty()) {
        return Some(name.clone());
    }
    match (metadata.get("job"), metadata.get("index")) {
        (Some(job), Some(index)) => Some(format!("{}/{}", job, index)),
        _ => None,
    }
}
