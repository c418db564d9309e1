//! In-memory OpenStack double
//!
//! [`FakeCloud`] implements every collaborator trait and [`ServiceFactory`]
//! over one shared state, so a test can seed servers and volumes, run an
//! operation through [`Cpi`](crate::Cpi) and then inspect both the state and
//! the recorded calls. Status transitions are instant: an attached volume is
//! `in-use` as soon as `attach_volume` returns. Use
//! [`FakeCloud::pin_volume_status`] to hold a volume in one status instead.

use async_trait::async_trait;
use stackcpi_cloud::{
    CloudError, ComputeService, CreateServerRequest, CreateSnapshotRequest, CreateVolumeRequest,
    Flavor, ImageService, LoadBalancerPool, LoadBalancerService, Metadata, Network,
    NetworkConfig, NetworkService, NetworkSpec, NetworkType, Pool, PoolMember, Port, Result,
    Server, ServerStatus, ServiceFactory, Snapshot, SnapshotStatus, VmCloudProperties,
    VmResources, Volume, VolumeAttachment, VolumeService, VolumeStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default availability zone of seeded servers
pub const FAKE_ZONE: &str = "nova";

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub operation: &'static str,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    successes_left: u32,
    /// Remaining failures before calls succeed again; `None` fails forever
    failures_left: Option<u32>,
    not_found: bool,
}

#[derive(Default)]
struct FakeState {
    servers: HashMap<String, Server>,
    volumes: HashMap<String, Volume>,
    snapshots: HashMap<String, Snapshot>,
    flavors: Vec<Flavor>,
    images: HashSet<String>,
    ports: HashMap<String, Port>,
    server_ports: HashMap<String, Vec<String>>,
    pools: HashMap<String, Pool>,
    members: HashMap<String, PoolMember>,
    failures: HashMap<&'static str, Failure>,
    pinned_volume_status: HashMap<String, VolumeStatus>,
    reported_devices: HashMap<String, String>,
    unavailable: HashSet<&'static str>,
    calls: Vec<FakeCall>,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check_failure(&mut self, operation: &'static str) -> Result<()> {
        let Some(failure) = self.failures.get_mut(operation) else {
            return Ok(());
        };
        if failure.successes_left > 0 {
            failure.successes_left -= 1;
            return Ok(());
        }
        match failure.failures_left {
            Some(0) => return Ok(()),
            Some(n) => failure.failures_left = Some(n - 1),
            None => {}
        }
        if failure.not_found {
            Err(CloudError::not_found("resource", operation))
        } else {
            Err(CloudError::ApiError(format!("injected {} failure", operation)))
        }
    }

    fn server(&self, server_id: &str) -> Result<&Server> {
        self.servers
            .get(server_id)
            .ok_or_else(|| CloudError::not_found("server", server_id))
    }

    fn server_mut(&mut self, server_id: &str) -> Result<&mut Server> {
        self.servers
            .get_mut(server_id)
            .ok_or_else(|| CloudError::not_found("server", server_id))
    }

    fn volume_mut(&mut self, volume_id: &str) -> Result<&mut Volume> {
        self.volumes
            .get_mut(volume_id)
            .ok_or_else(|| CloudError::not_found("volume", volume_id))
    }
}

/// Shared in-memory cloud; clones see the same state
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and apply any injected failure
    fn begin(&self, operation: &'static str, args: &[&str]) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(FakeCall {
            operation,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        state.check_failure(operation)?;
        Ok(state)
    }

    fn ensure_available(&self, service: &'static str) -> Result<()> {
        if self.lock().unavailable.contains(service) {
            return Err(CloudError::AuthenticationFailed(format!(
                "no {} endpoint in service catalog",
                service
            )));
        }
        Ok(())
    }

    // Seeding

    pub fn add_flavor(&self, flavor: Flavor) {
        self.lock().flavors.push(flavor);
    }

    pub fn add_image(&self, image_id: &str) {
        self.lock().images.insert(image_id.to_string());
    }

    /// Seed an `ACTIVE` server
    pub fn add_server(&self, server_id: &str, flavor_id: &str) {
        self.lock().servers.insert(
            server_id.to_string(),
            Server {
                id: server_id.to_string(),
                name: server_id.to_string(),
                status: ServerStatus::Active,
                flavor_id: flavor_id.to_string(),
                metadata: Metadata::new(),
                availability_zone: Some(FAKE_ZONE.to_string()),
            },
        );
    }

    pub fn set_server_status(&self, server_id: &str, status: ServerStatus) {
        if let Some(server) = self.lock().servers.get_mut(server_id) {
            server.status = status;
        }
    }

    pub fn set_server_metadata(&self, server_id: &str, pairs: &[(&str, &str)]) {
        if let Some(server) = self.lock().servers.get_mut(server_id) {
            for (key, value) in pairs {
                server.metadata.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Seed a port owned by a server
    pub fn add_server_port(&self, server_id: &str, port_id: &str) {
        let mut state = self.lock();
        state.ports.insert(
            port_id.to_string(),
            Port {
                id: port_id.to_string(),
                network_id: "net-seeded".to_string(),
                ip_address: None,
                mac_address: None,
            },
        );
        state
            .server_ports
            .entry(server_id.to_string())
            .or_default()
            .push(port_id.to_string());
    }

    /// Seed an `available` volume
    pub fn add_volume(&self, volume_id: &str, size_gib: u32) {
        self.lock().volumes.insert(
            volume_id.to_string(),
            Volume {
                id: volume_id.to_string(),
                name: volume_id.to_string(),
                size_gib,
                status: VolumeStatus::Available,
                attachments: Vec::new(),
                metadata: Metadata::new(),
                availability_zone: Some(FAKE_ZONE.to_string()),
            },
        );
    }

    /// Seed an attachment and mark the volume `in-use`
    pub fn add_attachment(&self, volume_id: &str, server_id: &str, device: &str) {
        if let Some(volume) = self.lock().volumes.get_mut(volume_id) {
            volume.attachments.push(VolumeAttachment {
                volume_id: volume_id.to_string(),
                server_id: server_id.to_string(),
                device: device.to_string(),
            });
            volume.status = VolumeStatus::InUse;
        }
    }

    pub fn set_volume_status(&self, volume_id: &str, status: VolumeStatus) {
        if let Some(volume) = self.lock().volumes.get_mut(volume_id) {
            volume.status = status;
        }
    }

    /// Report `status` for the volume on every read, whatever happens to it
    pub fn pin_volume_status(&self, volume_id: &str, status: VolumeStatus) {
        self.lock()
            .pinned_volume_status
            .insert(volume_id.to_string(), status);
    }

    /// Attach the volume at `device` regardless of the requested device
    pub fn report_device(&self, volume_id: &str, device: &str) {
        self.lock()
            .reported_devices
            .insert(volume_id.to_string(), device.to_string());
    }

    pub fn add_pool(&self, name: &str) {
        self.lock().pools.insert(
            name.to_string(),
            Pool {
                id: format!("pool-{}", name),
                name: name.to_string(),
            },
        );
    }

    pub fn add_snapshot(&self, snapshot_id: &str, volume_id: &str) {
        self.lock().snapshots.insert(
            snapshot_id.to_string(),
            Snapshot {
                id: snapshot_id.to_string(),
                name: snapshot_id.to_string(),
                volume_id: volume_id.to_string(),
                status: SnapshotStatus::Available,
                description: String::new(),
                metadata: Metadata::new(),
            },
        );
    }

    // Failure injection

    /// Fail every call to `operation`
    pub fn fail(&self, operation: &'static str) {
        self.fail_after(operation, 0);
    }

    /// Let `successes` calls to `operation` through, then fail the rest
    pub fn fail_after(&self, operation: &'static str, successes: u32) {
        self.lock().failures.insert(
            operation,
            Failure {
                successes_left: successes,
                failures_left: None,
                not_found: false,
            },
        );
    }

    /// Fail the next `failures` calls to `operation`, then recover
    pub fn fail_times(&self, operation: &'static str, failures: u32) {
        self.lock().failures.insert(
            operation,
            Failure {
                successes_left: 0,
                failures_left: Some(failures),
                not_found: false,
            },
        );
    }

    /// Answer every call to `operation` with a not-found error
    pub fn fail_not_found(&self, operation: &'static str) {
        self.lock().failures.insert(
            operation,
            Failure {
                successes_left: 0,
                failures_left: None,
                not_found: true,
            },
        );
    }

    /// Make the factory refuse to build a service (`compute`, `network`, ...)
    pub fn make_unavailable(&self, service: &'static str) {
        self.lock().unavailable.insert(service);
    }

    // Inspection

    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<FakeCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls_to(operation).len()
    }

    /// Operations that changed backend state, in call order
    pub fn mutating_calls(&self) -> Vec<&'static str> {
        self.lock()
            .calls
            .iter()
            .map(|c| c.operation)
            .filter(|op| !op.starts_with("get_") && !op.starts_with("list_"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn server(&self, server_id: &str) -> Option<Server> {
        self.lock().servers.get(server_id).cloned()
    }

    pub fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().servers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn volume(&self, volume_id: &str) -> Option<Volume> {
        self.lock().volumes.get(volume_id).cloned()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<Snapshot> {
        self.lock().snapshots.get(snapshot_id).cloned()
    }

    pub fn port_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().ports.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().members.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ComputeService for FakeCloud {
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server> {
        let mut state = self.begin("create_server", &[request.name.as_str()])?;
        let id = state.next_id("server");

        let instance_type = &request.cloud_properties.instance_type;
        let flavor_id = state
            .flavors
            .iter()
            .find(|f| &f.name == instance_type)
            .map(|f| f.id.clone())
            .unwrap_or_else(|| instance_type.clone());

        let server = Server {
            id: id.clone(),
            name: request.name.clone(),
            status: ServerStatus::Active,
            flavor_id,
            metadata: Metadata::new(),
            availability_zone: request
                .availability_zone
                .clone()
                .or_else(|| Some(FAKE_ZONE.to_string())),
        };
        let port_ids = request
            .network_config
            .port_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        state.server_ports.insert(id.clone(), port_ids);
        state.servers.insert(id, server.clone());
        Ok(server)
    }

    async fn get_server(&self, server_id: &str) -> Result<Server> {
        let state = self.begin("get_server", &[server_id])?;
        state.server(server_id).cloned()
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        let mut state = self.begin("delete_server", &[server_id])?;
        state
            .servers
            .remove(server_id)
            .ok_or_else(|| CloudError::not_found("server", server_id))?;
        for volume in state.volumes.values_mut() {
            volume.attachments.retain(|a| a.server_id != server_id);
            if volume.attachments.is_empty() && volume.status == VolumeStatus::InUse {
                volume.status = VolumeStatus::Available;
            }
        }
        state.server_ports.remove(server_id);
        Ok(())
    }

    async fn list_volume_attachments(&self, server_id: &str) -> Result<Vec<VolumeAttachment>> {
        let state = self.begin("list_volume_attachments", &[server_id])?;
        state.server(server_id)?;
        let mut attachments: Vec<VolumeAttachment> = state
            .volumes
            .values()
            .flat_map(|v| v.attachments.iter())
            .filter(|a| a.server_id == server_id)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.device.cmp(&b.device));
        Ok(attachments)
    }

    async fn attach_volume(
        &self,
        server_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<VolumeAttachment> {
        let mut state = self.begin("attach_volume", &[server_id, volume_id, device])?;
        state.server(server_id)?;
        let device = state
            .reported_devices
            .get(volume_id)
            .cloned()
            .unwrap_or_else(|| device.to_string());

        let volume = state.volume_mut(volume_id)?;
        let attachment = VolumeAttachment {
            volume_id: volume_id.to_string(),
            server_id: server_id.to_string(),
            device,
        };
        volume.attachments.push(attachment.clone());
        volume.status = VolumeStatus::InUse;
        Ok(attachment)
    }

    async fn detach_volume(&self, server_id: &str, volume_id: &str) -> Result<()> {
        let mut state = self.begin("detach_volume", &[server_id, volume_id])?;
        let volume = state.volume_mut(volume_id)?;
        volume.attachments.retain(|a| a.server_id != server_id);
        if volume.attachments.is_empty() {
            volume.status = VolumeStatus::Available;
        }
        Ok(())
    }

    async fn get_flavor_by_id(&self, flavor_id: &str) -> Result<Flavor> {
        let state = self.begin("get_flavor_by_id", &[flavor_id])?;
        state
            .flavors
            .iter()
            .find(|f| f.id == flavor_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("flavor", flavor_id))
    }

    async fn get_matching_flavor(
        &self,
        resources: &VmResources,
        boot_from_volume: bool,
    ) -> Result<Flavor> {
        let state = self.begin("get_matching_flavor", &[])?;
        state
            .flavors
            .iter()
            .filter(|f| f.vcpus >= resources.cpu && f.ram_mib >= resources.ram)
            .filter(|f| boot_from_volume || f.ephemeral_gib * 1024 >= resources.ephemeral_disk_size)
            .min_by_key(|f| (f.vcpus, f.ram_mib, f.ephemeral_gib))
            .cloned()
            .ok_or_else(|| CloudError::not_found("flavor", "matching"))
    }

    async fn get_metadata(&self, server_id: &str) -> Result<Metadata> {
        let state = self.begin("get_metadata", &[server_id])?;
        Ok(state.server(server_id)?.metadata.clone())
    }

    async fn update_server_metadata(&self, server_id: &str, metadata: &Metadata) -> Result<()> {
        let mut state = self.begin("update_server_metadata", &[server_id])?;
        let server = state.server_mut(server_id)?;
        server
            .metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn delete_server_metadata(&self, server_id: &str, keys: &[String]) -> Result<()> {
        let mut state = self.begin("delete_server_metadata", &[server_id])?;
        let server = state.server_mut(server_id)?;
        for key in keys {
            server.metadata.remove(key);
        }
        Ok(())
    }

    async fn update_server(&self, server_id: &str, name: &str) -> Result<()> {
        let mut state = self.begin("update_server", &[server_id, name])?;
        state.server_mut(server_id)?.name = name.to_string();
        Ok(())
    }

    async fn reboot_server(&self, server_id: &str) -> Result<()> {
        let state = self.begin("reboot_server", &[server_id])?;
        state.server(server_id)?;
        Ok(())
    }

    async fn get_server_az(&self, server_id: &str) -> Result<String> {
        let state = self.begin("get_server_az", &[server_id])?;
        Ok(state
            .server(server_id)?
            .availability_zone
            .clone()
            .unwrap_or_else(|| FAKE_ZONE.to_string()))
    }
}

#[async_trait]
impl NetworkService for FakeCloud {
    /// The first network listing `gateway` in `default` is the default
    /// network, falling back to the first non-VIP network.
    async fn get_network_configuration(
        &self,
        spec: &NetworkSpec,
        _cloud_properties: &VmCloudProperties,
    ) -> Result<NetworkConfig> {
        let _state = self.begin("get_network_configuration", &[])?;

        let mut candidates: Vec<(Network, bool)> = Vec::new();
        let mut vip_network = None;
        let mut security_groups: Vec<String> = Vec::new();

        for (name, settings) in spec {
            let network = Network {
                name: name.clone(),
                network_type: settings.network_type,
                net_id: settings.cloud_properties.net_id.clone().unwrap_or_default(),
                ip: settings.ip.clone(),
                port_id: None,
            };
            for group in &settings.cloud_properties.security_groups {
                if !security_groups.contains(group) {
                    security_groups.push(group.clone());
                }
            }
            if settings.network_type == NetworkType::Vip {
                vip_network = Some(network);
            } else {
                let is_gateway = settings.default.iter().any(|d| d == "gateway");
                candidates.push((network, is_gateway));
            }
        }

        let default_network = candidates
            .iter()
            .find(|(_, is_gateway)| *is_gateway)
            .or_else(|| candidates.first())
            .map(|(network, _)| network.clone())
            .ok_or_else(|| CloudError::InvalidArgument("no default network".to_string()))?;

        let manual_networks = candidates
            .into_iter()
            .map(|(network, _)| network)
            .filter(|n| n.network_type == NetworkType::Manual)
            .collect();

        Ok(NetworkConfig {
            default_network,
            manual_networks,
            vip_network,
            security_groups,
        })
    }

    async fn create_port(&self, network: &Network, _security_groups: &[String]) -> Result<Port> {
        let mut state = self.begin("create_port", &[network.name.as_str()])?;
        let port = Port {
            id: state.next_id("port"),
            network_id: network.net_id.clone(),
            ip_address: network.ip.clone(),
            mac_address: None,
        };
        state.ports.insert(port.id.clone(), port.clone());
        Ok(port)
    }

    async fn get_ports(&self, server_id: &str) -> Result<Vec<Port>> {
        let state = self.begin("get_ports", &[server_id])?;
        let ports: Vec<Port> = state
            .server_ports
            .get(server_id)
            .map(|ids| ids.iter().filter_map(|id| state.ports.get(id).cloned()).collect())
            .unwrap_or_default();
        Ok(ports)
    }

    async fn delete_ports(&self, ports: &[Port]) -> Result<()> {
        let ids: Vec<&str> = ports.iter().map(|p| p.id.as_str()).collect();
        let mut state = self.begin("delete_ports", &ids)?;
        for id in ids {
            state.ports.remove(id);
        }
        Ok(())
    }

    async fn configure_vip_network(&self, server_id: &str, vip_network: &Network) -> Result<()> {
        let state = self.begin(
            "configure_vip_network",
            &[server_id, vip_network.name.as_str()],
        )?;
        state.server(server_id)?;
        Ok(())
    }

    async fn get_subnet_id(&self, network_id: &str) -> Result<String> {
        let _state = self.begin("get_subnet_id", &[network_id])?;
        Ok(format!("subnet-{}", network_id))
    }
}

#[async_trait]
impl ImageService for FakeCloud {
    async fn get_image(&self, image_id: &str) -> Result<String> {
        let state = self.begin("get_image", &[image_id])?;
        if state.images.contains(image_id) {
            Ok(image_id.to_string())
        } else {
            Err(CloudError::not_found("image", image_id))
        }
    }
}

#[async_trait]
impl VolumeService for FakeCloud {
    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume> {
        let mut state = self.begin("create_volume", &[request.name.as_str()])?;
        let volume = Volume {
            id: state.next_id("volume"),
            name: request.name.clone(),
            size_gib: request.size_gib,
            status: VolumeStatus::Available,
            attachments: Vec::new(),
            metadata: Metadata::new(),
            availability_zone: request.availability_zone.clone(),
        };
        state.volumes.insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume> {
        let state = self.begin("get_volume", &[volume_id])?;
        let mut volume = state
            .volumes
            .get(volume_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("volume", volume_id))?;
        if let Some(status) = state.pinned_volume_status.get(volume_id) {
            volume.status = status.clone();
        }
        Ok(volume)
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let mut state = self.begin("delete_volume", &[volume_id])?;
        state
            .volumes
            .remove(volume_id)
            .ok_or_else(|| CloudError::not_found("volume", volume_id))?;
        Ok(())
    }

    async fn extend_volume_size(&self, volume_id: &str, new_size_gib: u32) -> Result<()> {
        let size = new_size_gib.to_string();
        let mut state = self.begin("extend_volume_size", &[volume_id, size.as_str()])?;
        state.volume_mut(volume_id)?.size_gib = new_size_gib;
        Ok(())
    }

    async fn set_volume_metadata(&self, volume_id: &str, metadata: &Metadata) -> Result<()> {
        let mut state = self.begin("set_volume_metadata", &[volume_id])?;
        let volume = state.volume_mut(volume_id)?;
        volume
            .metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn create_snapshot(&self, request: &CreateSnapshotRequest) -> Result<Snapshot> {
        let mut state = self.begin("create_snapshot", &[request.volume_id.as_str()])?;
        state.volume_mut(&request.volume_id)?;
        let snapshot = Snapshot {
            id: state.next_id("snapshot"),
            name: request.name.clone(),
            volume_id: request.volume_id.clone(),
            status: SnapshotStatus::Available,
            description: request.description.clone(),
            metadata: request.metadata.clone(),
        };
        state.snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        let state = self.begin("get_snapshot", &[snapshot_id])?;
        state
            .snapshots
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("snapshot", snapshot_id))
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.begin("delete_snapshot", &[snapshot_id])?;
        state
            .snapshots
            .remove(snapshot_id)
            .ok_or_else(|| CloudError::not_found("snapshot", snapshot_id))?;
        Ok(())
    }
}

#[async_trait]
impl LoadBalancerService for FakeCloud {
    async fn get_pool(&self, name: &str) -> Result<Pool> {
        let state = self.begin("get_pool", &[name])?;
        state
            .pools
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::not_found("pool", name))
    }

    async fn create_pool_member(
        &self,
        pool: &Pool,
        ip: &str,
        pool_properties: &LoadBalancerPool,
        _subnet_id: &str,
        _timeout: Duration,
    ) -> Result<PoolMember> {
        let mut state = self.begin("create_pool_member", &[pool.id.as_str(), ip])?;
        let member = PoolMember {
            id: state.next_id("member"),
            pool_id: pool.id.clone(),
            address: ip.to_string(),
            protocol_port: pool_properties.port,
        };
        state.members.insert(member.id.clone(), member.clone());
        Ok(member)
    }

    async fn delete_pool_member(
        &self,
        pool_id: &str,
        member_id: &str,
        _timeout: Duration,
    ) -> Result<()> {
        let mut state = self.begin("delete_pool_member", &[pool_id, member_id])?;
        state.members.remove(member_id);
        Ok(())
    }
}

#[async_trait]
impl ServiceFactory for FakeCloud {
    async fn compute(&self) -> Result<Arc<dyn ComputeService>> {
        self.ensure_available("compute")?;
        Ok(Arc::new(self.clone()))
    }

    async fn network(&self) -> Result<Arc<dyn NetworkService>> {
        self.ensure_available("network")?;
        Ok(Arc::new(self.clone()))
    }

    async fn image(&self) -> Result<Arc<dyn ImageService>> {
        self.ensure_available("image")?;
        Ok(Arc::new(self.clone()))
    }

    async fn volume(&self) -> Result<Arc<dyn VolumeService>> {
        self.ensure_available("volume")?;
        Ok(Arc::new(self.clone()))
    }

    async fn load_balancer(&self) -> Result<Arc<dyn LoadBalancerService>> {
        self.ensure_available("load_balancer")?;
        Ok(Arc::new(self.clone()))
    }
}
