mod common;

use common::{TestCloud, caller_metadata, flavor, test_config};
use serde_json::json;
use stackcpi_cloud::{RetryConfig, ServerStatus, VmResources};
use stackcpi_core::{API_VERSION, CreateVmRequest, CpiError};

const STEMCELL: &str = "stemcell-1";

fn manual_network(net_id: &str, ip: &str) -> serde_json::Value {
    json!({
        "type": "manual",
        "ip": ip,
        "cloud_properties": {"net_id": net_id, "security_groups": ["bosh"]}
    })
}

fn request(networks: serde_json::Value, pools: serde_json::Value) -> CreateVmRequest {
    serde_json::from_value(json!({
        "agent_id": "agent-1",
        "stemcell_id": STEMCELL,
        "cloud_properties": {
            "instance_type": "m1.small",
            "loadbalancer_pools": pools
        },
        "networks": networks,
        "environment": {"bosh": {"group": "web"}}
    }))
    .unwrap()
}

/// Two manual networks, `a-private` being the default
fn two_manual_networks() -> serde_json::Value {
    let mut default = manual_network("net-a", "10.0.0.5");
    default["default"] = json!(["dns", "gateway"]);
    json!({
        "a-private": default,
        "b-backend": manual_network("net-b", "10.1.0.5")
    })
}

fn cloud_with_stemcell() -> TestCloud {
    let cloud = TestCloud::new();
    cloud.fake.add_image(STEMCELL);
    cloud
}

#[tokio::test(start_paused = true)]
async fn test_create_vm_provisions_ports_server_and_pool_members() {
    let cloud = cloud_with_stemcell();
    cloud.fake.add_pool("web");

    let created = cloud
        .cpi
        .create_vm(&request(
            two_manual_networks(),
            json!([{"name": "web", "port": 80}]),
        ))
        .await
        .unwrap();

    let server = cloud.fake.server(&created.vm_id).unwrap();
    assert!(server.name.starts_with("vm-"));
    assert_eq!(server.status, ServerStatus::Active);

    // One port per manual network, recorded on the resolved networks
    assert_eq!(cloud.fake.port_ids().len(), 2);
    assert_eq!(created.networks.port_ids().len(), 2);
    assert!(created.networks.default_network.port_id.is_some());

    let members = cloud.fake.member_ids();
    assert_eq!(members.len(), 1);
    assert_eq!(
        server.metadata.get("lbaas_pool_1"),
        Some(&format!("pool-web/{}", members[0]))
    );

    let member_call = &cloud.fake.calls_to("create_pool_member")[0];
    assert_eq!(member_call.args, vec!["pool-web", "10.0.0.5"]);
}

#[tokio::test(start_paused = true)]
async fn test_create_vm_without_pools_skips_tagging() {
    let cloud = cloud_with_stemcell();

    cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap();

    assert_eq!(cloud.fake.call_count("get_pool"), 0);
    assert_eq!(cloud.fake.call_count("update_server_metadata"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_vm_missing_stemcell_has_no_side_effects() {
    let cloud = TestCloud::new();

    let err = cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains(STEMCELL));
    assert!(cloud.fake.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_vm_unavailable_service_aborts_before_any_call() {
    let cloud = cloud_with_stemcell();
    cloud.fake.make_unavailable("load_balancer");

    let err = cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("load balancer service"));
    assert!(cloud.fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_port_failure_triggers_no_cleanup() {
    let cloud = cloud_with_stemcell();
    cloud.fake.fail("create_port");

    let err = cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("a-private"));
    assert_eq!(cloud.fake.call_count("delete_ports"), 0);
    assert_eq!(cloud.fake.call_count("delete_server"), 0);
    assert_eq!(cloud.fake.call_count("create_server"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_port_failure_deletes_first_port() {
    let cloud = cloud_with_stemcell();
    cloud.fake.fail_after("create_port", 1);

    let err = cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("b-backend"));
    let deletes = cloud.fake.calls_to("delete_ports");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].args.len(), 1);
    assert!(cloud.fake.port_ids().is_empty());
    assert_eq!(cloud.fake.call_count("create_server"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_failure_deletes_all_ports() {
    let cloud = cloud_with_stemcell();
    cloud.fake.fail("create_server");

    let err = cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("injected create_server failure"));
    let deletes = cloud.fake.calls_to("delete_ports");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].args.len(), 2);
    assert!(cloud.fake.port_ids().is_empty());
    assert_eq!(cloud.fake.call_count("delete_server"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_vip_failure_deletes_ports_then_server() {
    let cloud = cloud_with_stemcell();
    cloud.fake.fail("configure_vip_network");

    let mut networks = two_manual_networks();
    networks["public"] = json!({"type": "vip", "ip": "203.0.113.7"});

    let err = cloud
        .cpi
        .create_vm(&request(networks, json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("VIP"));
    assert!(cloud.fake.server_ids().is_empty());
    assert!(cloud.fake.port_ids().is_empty());

    let cleanup: Vec<&str> = cloud
        .fake
        .mutating_calls()
        .into_iter()
        .filter(|op| op.starts_with("delete_"))
        .collect();
    assert_eq!(cleanup, vec!["delete_ports", "delete_server"]);
}

#[tokio::test(start_paused = true)]
async fn test_tagging_failure_rolls_back_but_leaves_pool_members() {
    let cloud = cloud_with_stemcell();
    cloud.fake.add_pool("web");
    cloud.fake.fail("update_server_metadata");

    let err = cloud
        .cpi
        .create_vm(&request(
            two_manual_networks(),
            json!([{"name": "web", "port": 80}]),
        ))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("pool memberships"));
    assert!(cloud.fake.server_ids().is_empty());
    assert!(cloud.fake.port_ids().is_empty());
    assert_eq!(cloud.fake.call_count("delete_pool_member"), 0);
    assert_eq!(cloud.fake.member_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_pool_rolls_back_server() {
    let cloud = cloud_with_stemcell();

    let err = cloud
        .cpi
        .create_vm(&request(
            two_manual_networks(),
            json!([{"name": "absent", "port": 80}]),
        ))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(cloud.fake.call_count("delete_server"), 1);
    assert!(cloud.fake.server_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_failure_does_not_mask_original_error() {
    let cloud = cloud_with_stemcell();
    cloud.fake.fail("configure_vip_network");
    cloud.fake.fail("delete_ports");
    cloud.fake.fail("delete_server");

    let mut networks = two_manual_networks();
    networks["public"] = json!({"type": "vip", "ip": "203.0.113.7"});

    let err = cloud
        .cpi
        .create_vm(&request(networks, json!([])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("injected configure_vip_network failure"));
    assert_eq!(cloud.fake.call_count("delete_server"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_port_creation_is_retried() {
    let mut config = test_config();
    config.retry_policies = config.retry_policies.with_policy(
        "create_port",
        RetryConfig {
            max_attempts: 3,
            sleep_duration: 2,
        },
    );
    let cloud = TestCloud::with_config(config);
    cloud.fake.add_image(STEMCELL);
    cloud.fake.fail_times("create_port", 2);

    cloud
        .cpi
        .create_vm(&request(two_manual_networks(), json!([])))
        .await
        .unwrap();

    // Two failures on the first network, then one call per network
    assert_eq!(cloud.fake.call_count("create_port"), 4);
    assert_eq!(cloud.fake.port_ids().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_vm_only_removes_tagged_pool_members() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);
    cloud.fake.add_server_port("vm-1", "port-a");
    cloud.fake.set_server_metadata(
        "vm-1",
        &[
            ("lbaas_pool_1", "pool-x/member-y"),
            ("job", "pool-a/member-b"),
            ("deployment", "cf"),
        ],
    );

    cloud.cpi.delete_vm("vm-1").await.unwrap();

    let deletes = cloud.fake.calls_to("delete_pool_member");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].args, vec!["pool-x", "member-y"]);
    assert!(cloud.fake.server("vm-1").is_none());
    assert!(cloud.fake.port_ids().is_empty());

    // Server goes before its ports
    let order: Vec<&str> = cloud
        .fake
        .mutating_calls()
        .into_iter()
        .filter(|op| *op == "delete_server" || *op == "delete_ports")
        .collect();
    assert_eq!(order, vec!["delete_server", "delete_ports"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_vm_pool_member_failure_aborts() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);
    cloud
        .fake
        .set_server_metadata("vm-1", &[("lbaas_pool_1", "pool-x/member-y")]);
    cloud.fake.fail("delete_pool_member");

    let err = cloud.cpi.delete_vm("vm-1").await.unwrap_err();

    assert!(err.to_string().contains("pool-x/member-y"));
    assert!(cloud.fake.server("vm-1").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_delete_vm_rejects_malformed_pool_tag() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);
    cloud.fake.add_server_port("vm-1", "port-a");
    cloud.fake.set_server_metadata(
        "vm-1",
        &[
            ("lbaas_pool_1", "pool-x/member-y"),
            ("lbaas_pool_2", "garbage"),
        ],
    );

    let err = cloud.cpi.delete_vm("vm-1").await.unwrap_err();

    assert!(matches!(err, CpiError::Validation(_)));
    let message = err.to_string();
    assert!(message.contains("lbaas_pool_2"));
    assert!(message.contains("garbage"));
    assert!(message.contains("vm-1"));
    assert!(cloud.fake.server("vm-1").is_some());
    assert_eq!(cloud.fake.call_count("delete_pool_member"), 0);
    assert_eq!(cloud.fake.call_count("delete_server"), 0);
    assert_eq!(cloud.fake.port_ids(), vec!["port-a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_vm_is_idempotent() {
    let cloud = TestCloud::new();

    cloud.cpi.delete_vm("vm-gone").await.unwrap();

    assert_eq!(cloud.fake.call_count("delete_server"), 1);
    assert_eq!(cloud.fake.call_count("delete_ports"), 0);
}

#[tokio::test]
async fn test_has_vm() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);
    cloud.fake.add_server("vm-2", common::PLAIN_FLAVOR);
    cloud.fake.set_server_status("vm-2", ServerStatus::Terminated);

    assert!(cloud.cpi.has_vm("vm-1").await.unwrap());
    assert!(!cloud.cpi.has_vm("vm-2").await.unwrap());
    assert!(!cloud.cpi.has_vm("vm-3").await.unwrap());

    cloud.fake.fail("get_server");
    let err = cloud.cpi.has_vm("vm-1").await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_set_vm_metadata_stores_strings() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);

    cloud
        .cpi
        .set_vm_metadata(
            "vm-1",
            &caller_metadata(json!({"job": "web", "index": 0, "compiling": null})),
        )
        .await
        .unwrap();

    let server = cloud.fake.server("vm-1").unwrap();
    assert_eq!(server.metadata.get("index").map(String::as_str), Some("0"));
    assert!(!server.metadata.contains_key("compiling"));
    assert_eq!(server.name, "vm-1");
    assert_eq!(cloud.fake.call_count("update_server"), 0);
}

#[tokio::test]
async fn test_set_vm_metadata_renames_with_human_readable_names() {
    let mut config = test_config();
    config.human_readable_vm_names = true;
    let cloud = TestCloud::with_config(config);
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);

    cloud
        .cpi
        .set_vm_metadata("vm-1", &caller_metadata(json!({"job": "web", "index": 2})))
        .await
        .unwrap();

    assert_eq!(cloud.fake.server("vm-1").unwrap().name, "web/2");
}

#[tokio::test]
async fn test_set_vm_metadata_on_missing_vm() {
    let cloud = TestCloud::new();

    let err = cloud
        .cpi
        .set_vm_metadata("vm-9", &caller_metadata(json!({"job": "web"})))
        .await
        .unwrap_err();

    assert!(matches!(err, CpiError::NotFound { kind: "VM", .. }));
}

#[tokio::test(start_paused = true)]
async fn test_reboot_vm() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);

    cloud.cpi.reboot_vm("vm-1").await.unwrap();
    assert_eq!(cloud.fake.call_count("reboot_server"), 1);

    let err = cloud.cpi.reboot_vm("vm-2").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_reboot_vm_times_out_when_server_stays_down() {
    let cloud = TestCloud::new();
    cloud.fake.add_server("vm-1", common::PLAIN_FLAVOR);
    cloud.fake.set_server_status("vm-1", ServerStatus::Shutoff);

    let err = cloud.cpi.reboot_vm("vm-1").await.unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("ACTIVE"));
}

#[tokio::test]
async fn test_calculate_vm_cloud_properties() {
    let cloud = TestCloud::new();
    let mut large = flavor("flavor-large", "m1.large", 40, 0);
    large.vcpus = 4;
    large.ram_mib = 8192;
    cloud.fake.add_flavor(large);

    let resources = VmResources {
        cpu: 2,
        ram: 4096,
        ephemeral_disk_size: 10240,
    };
    let props = cloud
        .cpi
        .calculate_vm_cloud_properties(&resources)
        .await
        .unwrap();

    assert_eq!(props.instance_type, "m1.large");
    assert_eq!(props.root_disk, None);
}

#[tokio::test]
async fn test_calculate_vm_cloud_properties_with_boot_volume() {
    let mut config = test_config();
    config.boot_from_volume = true;
    let cloud = TestCloud::with_config(config);

    let resources = VmResources {
        cpu: 1,
        ram: 1024,
        ephemeral_disk_size: 3000,
    };
    let props = cloud
        .cpi
        .calculate_vm_cloud_properties(&resources)
        .await
        .unwrap();

    assert_eq!(props.instance_type, "m1.small");
    assert_eq!(props.root_disk.map(|d| d.size), Some(6));
}

#[test]
fn test_info() {
    let cloud = TestCloud::new();
    let info = cloud.cpi.info();
    assert_eq!(info.api_version, API_VERSION);
    assert!(info.stemcell_formats.contains(&"openstack-raw".to_string()));
}
