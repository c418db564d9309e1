use serde_json::Value;
use stackcpi_cloud::{Flavor, RetryConfig, RetryPolicies};
use stackcpi_config::CpiConfig;
use stackcpi_core::testing::FakeCloud;
use stackcpi_core::{CallerMetadata, Cpi};
use std::sync::Arc;
use std::time::Duration;

pub const STATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Flavor without ephemeral or swap disks
pub const PLAIN_FLAVOR: &str = "flavor-plain";

/// Single attempt per call so injected failures surface immediately
pub fn test_config() -> CpiConfig {
    CpiConfig {
        state_timeout: STATE_TIMEOUT,
        poll_interval: Duration::from_secs(1),
        retry_policies: RetryPolicies::new().with_policy(
            "default",
            RetryConfig {
                max_attempts: 1,
                sleep_duration: 1,
            },
        ),
        ..Default::default()
    }
}

pub struct TestCloud {
    pub fake: FakeCloud,
    pub cpi: Cpi,
}

impl TestCloud {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: CpiConfig) -> Self {
        let fake = FakeCloud::new();
        fake.add_flavor(flavor(PLAIN_FLAVOR, "m1.small", 0, 0));
        let cpi = Cpi::new(Arc::new(fake.clone()), config);
        Self { fake, cpi }
    }
}

pub fn flavor(id: &str, name: &str, ephemeral_gib: u32, swap_mib: u32) -> Flavor {
    Flavor {
        id: id.to_string(),
        name: name.to_string(),
        vcpus: 1,
        ram_mib: 2048,
        disk_gib: 10,
        ephemeral_gib,
        swap_mib,
    }
}

#[allow(dead_code)]
pub fn caller_metadata(value: Value) -> CallerMetadata {
    match value {
        Value::Object(map) => map,
        other => panic!("metadata must be an object, got {}", other),
    }
}
