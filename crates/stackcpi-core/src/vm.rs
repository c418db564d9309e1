//! VM provisioning, teardown and maintenance

use crate::cpi::Cpi;
use crate::error::{CloudResultExt, CpiError, Result};
use crate::metadata::{self, CallerMetadata, PoolMembership};
use crate::rollback::ProvisionRollback;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use stackcpi_cloud::{
    ComputeService, CreateServerRequest, LoadBalancerService, NetworkConfig, NetworkService,
    NetworkSpec, RootDisk, ServerStatus, VmCloudProperties, VmResources,
};
use std::sync::Arc;
use uuid::Uuid;

/// Extra GiB added to a boot volume on top of the ephemeral disk size
const ROOT_DISK_OVERHEAD_GIB: u32 = 3;

/// Everything the caller supplies to boot a VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVmRequest {
    pub agent_id: String,

    pub stemcell_id: String,

    pub cloud_properties: VmCloudProperties,

    pub networks: NetworkSpec,

    /// Existing disks the VM should be placed near
    #[serde(default)]
    pub disk_ids: Vec<String>,

    /// Opaque environment handed to the agent
    #[serde(default)]
    pub environment: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedVm {
    pub vm_id: String,

    /// Resolved networks, including the ports created for manual networks
    pub networks: NetworkConfig,
}

/// Result of `calculate_vm_cloud_properties`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedVmProperties {
    pub instance_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_disk: Option<RootDisk>,
}

struct ProvisionServices {
    compute: Arc<dyn ComputeService>,
    network: Arc<dyn NetworkService>,
    load_balancer: Arc<dyn LoadBalancerService>,
}

impl Cpi {
    /// Boot a VM with its ports and load-balancer memberships
    ///
    /// Any failure after the first port exists rolls back the ports and, once
    /// created, the server. Pool memberships are left to server deletion.
    pub async fn create_vm(&self, request: &CreateVmRequest) -> Result<CreatedVm> {
        let services = ProvisionServices {
            compute: self.compute_service().await?,
            network: self.network_service().await?,
            load_balancer: self.load_balancer_service().await?,
        };
        let image = self.image_service().await?;

        let image_id = image
            .get_image(&request.stemcell_id)
            .await
            .with_context(|| format!("Failed to resolve stemcell '{}'", request.stemcell_id))?;

        let mut network_config = services
            .network
            .get_network_configuration(&request.networks, &request.cloud_properties)
            .await
            .with_context(|| {
                format!("Failed to resolve networks for agent '{}'", request.agent_id)
            })?;

        let mut rollback =
            ProvisionRollback::new(services.compute.clone(), services.network.clone());

        match self
            .provision(&services, request, image_id, &mut network_config, &mut rollback)
            .await
        {
            Ok(vm_id) => {
                tracing::info!("Created VM {} for agent {}", vm_id, request.agent_id);
                Ok(CreatedVm {
                    vm_id,
                    networks: network_config,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "Creating VM for agent {} failed, rolling back: {}",
                    request.agent_id,
                    e
                );
                rollback.unwind().await;
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        services: &ProvisionServices,
        request: &CreateVmRequest,
        image_id: String,
        network_config: &mut NetworkConfig,
        rollback: &mut ProvisionRollback,
    ) -> Result<String> {
        let network = services.network.as_ref();
        let compute = services.compute.as_ref();

        let security_groups = network_config.security_groups.clone();
        let security_groups = security_groups.as_slice();
        let manual_networks = network_config.manual_networks.clone();
        for manual in &manual_networks {
            let port = self
                .retry("create_port", move || network.create_port(manual, security_groups))
                .await
                .with_context(|| format!("Failed to create port on network '{}'", manual.name))?;
            tracing::debug!("Created port {} on network {}", port.id, manual.name);
            network_config.assign_port(&manual.name, &port.id);
            rollback.track_port(port);
        }

        let server_request = CreateServerRequest {
            name: format!("vm-{}", Uuid::new_v4()),
            image_id,
            cloud_properties: request.cloud_properties.clone(),
            availability_zone: select_availability_zone(&request.cloud_properties),
            network_config: network_config.clone(),
            disk_ids: request.disk_ids.clone(),
            agent_id: request.agent_id.clone(),
            environment: request.environment.clone(),
            config_drive: self.config().config_drive.is_some(),
        };
        let server = compute
            .create_server(&server_request)
            .await
            .with_context(|| format!("Failed to create server '{}'", server_request.name))?;
        rollback.track_server(&server.id);
        tracing::info!("Created server {} ({})", server.id, server.name);

        if let Some(vip) = &network_config.vip_network {
            network
                .configure_vip_network(&server.id, vip)
                .await
                .with_context(|| {
                    format!("Failed to configure VIP network for server '{}'", server.id)
                })?;
        }

        let memberships = self
            .register_pool_members(services, network_config, &request.cloud_properties)
            .await?;

        if !memberships.is_empty() {
            let tags = metadata::pool_membership_tags(&memberships);
            compute
                .update_server_metadata(&server.id, &tags)
                .await
                .with_context(|| {
                    format!("Failed to tag server '{}' with pool memberships", server.id)
                })?;
        }

        Ok(server.id)
    }

    async fn register_pool_members(
        &self,
        services: &ProvisionServices,
        network_config: &NetworkConfig,
        cloud_properties: &VmCloudProperties,
    ) -> Result<Vec<PoolMembership>> {
        let mut memberships = Vec::new();
        if cloud_properties.loadbalancer_pools.is_empty() {
            return Ok(memberships);
        }

        let load_balancer = services.load_balancer.as_ref();
        let default_network = &network_config.default_network;
        let timeout = self.config().state_timeout;

        let ip = default_network.ip.as_deref().ok_or_else(|| {
            CpiError::Validation(format!(
                "Network '{}' has no IP to register in load balancer pools",
                default_network.name
            ))
        })?;

        for binding in &cloud_properties.loadbalancer_pools {
            let pool = load_balancer
                .get_pool(&binding.name)
                .await
                .with_context(|| format!("Failed to get load balancer pool '{}'", binding.name))?;

            let subnet_id = services
                .network
                .get_subnet_id(&default_network.net_id)
                .await
                .with_context(|| {
                    format!("Failed to get subnet of network '{}'", default_network.net_id)
                })?;
            let subnet_id = subnet_id.as_str();
            let pool_ref = &pool;

            let member = self
                .retry("create_pool_member", move || {
                    load_balancer.create_pool_member(pool_ref, ip, binding, subnet_id, timeout)
                })
                .await
                .with_context(|| {
                    format!("Failed to add {}:{} to pool '{}'", ip, binding.port, binding.name)
                })?;

            tracing::info!("Added {} to pool {} as member {}", ip, pool.name, member.id);
            memberships.push(PoolMembership {
                pool_id: pool.id.clone(),
                member_id: member.id,
            });
        }

        Ok(memberships)
    }

    /// Delete a VM, its pool memberships and its ports
    ///
    /// A VM that is already gone is not an error.
    pub async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        let compute_service = self.compute_service().await?;
        let network_service = self.network_service().await?;
        let load_balancer_service = self.load_balancer_service().await?;
        let compute = compute_service.as_ref();
        let load_balancer = load_balancer_service.as_ref();

        let ports = match network_service.get_ports(vm_id).await {
            Ok(ports) => ports,
            Err(e) => {
                tracing::warn!("Failed to list ports of VM {}: {}", vm_id, e);
                Vec::new()
            }
        };

        let server_metadata = match compute.get_metadata(vm_id).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                tracing::info!("VM {} not found, skipping pool member cleanup", vm_id);
                Default::default()
            }
            Err(e) => {
                return Err(CpiError::cloud(
                    format!("Failed to get metadata of VM '{}'", vm_id),
                    e,
                ));
            }
        };

        let memberships = metadata::pool_memberships(vm_id, &server_metadata)?;
        let timeout = self.config().state_timeout;
        for (key, membership) in memberships {
            let (pool_id, member_id) = (membership.pool_id.as_str(), membership.member_id.as_str());
            match self
                .retry("delete_pool_member", move || {
                    load_balancer.delete_pool_member(pool_id, member_id, timeout)
                })
                .await
            {
                Ok(()) => tracing::info!("Removed member {} from pool {}", member_id, pool_id),
                Err(e) if e.is_not_found() => {
                    tracing::info!("Member {} of pool {} already gone", member_id, pool_id);
                }
                Err(e) => {
                    return Err(CpiError::cloud(
                        format!(
                            "Failed to delete pool member '{}' ({}) of VM '{}'",
                            membership.tag_value(),
                            key,
                            vm_id
                        ),
                        e,
                    ));
                }
            }
        }

        match compute.delete_server(vm_id).await {
            Ok(()) => tracing::info!("Deleted server {}", vm_id),
            Err(e) if e.is_not_found() => tracing::info!("Server {} already deleted", vm_id),
            Err(e) => {
                return Err(CpiError::cloud(format!("Failed to delete VM '{}'", vm_id), e));
            }
        }

        if !ports.is_empty() {
            network_service
                .delete_ports(&ports)
                .await
                .with_context(|| format!("Failed to delete ports of VM '{}'", vm_id))?;
        }

        Ok(())
    }

    /// Whether the VM exists and is not deleted or terminated
    pub async fn has_vm(&self, vm_id: &str) -> Result<bool> {
        let compute = self.compute_service().await?;
        match compute.get_server(vm_id).await {
            Ok(server) if server.status.is_gone() => {
                tracing::info!("VM {} is {}", vm_id, server.status);
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(CpiError::cloud(format!("Failed to get VM '{}'", vm_id), e)),
        }
    }

    /// Store deployment metadata on the server
    ///
    /// With `human_readable_vm_names` the server is also renamed after the
    /// `name` tag, or `<job>/<index>`.
    pub async fn set_vm_metadata(&self, vm_id: &str, metadata: &CallerMetadata) -> Result<()> {
        let compute = self.compute_service().await?;
        compute.get_server(vm_id).await.or_not_found("VM", vm_id)?;

        let metadata = metadata::to_string_metadata(metadata);
        if !metadata.is_empty() {
            compute
                .update_server_metadata(vm_id, &metadata)
                .await
                .with_context(|| format!("Failed to set metadata of VM '{}'", vm_id))?;
        }

        if self.config().human_readable_vm_names {
            if let Some(name) = metadata::server_name(&metadata) {
                compute
                    .update_server(vm_id, &name)
                    .await
                    .with_context(|| format!("Failed to rename VM '{}' to '{}'", vm_id, name))?;
                tracing::info!("Renamed VM {} to {}", vm_id, name);
            }
        }

        Ok(())
    }

    /// Soft reboot and wait for the server to come back
    pub async fn reboot_vm(&self, vm_id: &str) -> Result<()> {
        let compute_service = self.compute_service().await?;
        let compute = compute_service.as_ref();
        compute.get_server(vm_id).await.or_not_found("VM", vm_id)?;

        self.retry("reboot_server", move || compute.reboot_server(vm_id))
            .await
            .with_context(|| format!("Failed to reboot VM '{}'", vm_id))?;

        self.waiter()
            .wait_for(
                &format!("server {}", vm_id),
                ServerStatus::Active,
                move || async move { compute.get_server(vm_id).await.map(|s| s.status) },
            )
            .await
            .with_context(|| format!("VM '{}' did not come back after reboot", vm_id))
    }

    /// Smallest flavor for the requested resources
    pub async fn calculate_vm_cloud_properties(
        &self,
        resources: &VmResources,
    ) -> Result<CalculatedVmProperties> {
        let compute = self.compute_service().await?;
        let boot_from_volume = self.config().boot_from_volume;

        let flavor = compute
            .get_matching_flavor(resources, boot_from_volume)
            .await
            .with_context(|| {
                format!(
                    "Failed to find a flavor with {} CPU, {} MiB RAM, {} MiB ephemeral disk",
                    resources.cpu, resources.ram, resources.ephemeral_disk_size
                )
            })?;

        let root_disk = boot_from_volume.then(|| RootDisk {
            size: resources.ephemeral_disk_size.div_ceil(1024) + ROOT_DISK_OVERHEAD_GIB,
        });

        Ok(CalculatedVmProperties {
            instance_type: flavor.name,
            root_disk,
        })
    }
}

/// One zone picked at random from `availability_zones`, else `availability_zone`
fn select_availability_zone(cloud_properties: &VmCloudProperties) -> Option<String> {
    cloud_properties
        .availability_zones
        .choose(&mut rand::thread_rng())
        .cloned()
        .or_else(|| cloud_properties.availability_zone.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_availability_zone() {
        let mut props = VmCloudProperties {
            availability_zone: Some("z1".to_string()),
            ..Default::default()
        };
        assert_eq!(select_availability_zone(&props).as_deref(), Some("z1"));

        props.availability_zones = vec!["z2".to_string(), "z3".to_string()];
        for _ in 0..20 {
            let zone = select_availability_zone(&props).unwrap();
            assert!(zone == "z2" || zone == "z3");
        }

        assert_eq!(select_availability_zone(&VmCloudProperties::default()), None);
    }
}
