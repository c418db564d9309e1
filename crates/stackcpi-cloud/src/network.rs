//! Network specification supplied by the caller and the configuration
//! resolved from it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Networks requested for a VM, keyed by network name
pub type NetworkSpec = BTreeMap<String, NetworkSettings>;

/// Settings for one requested network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(rename = "type", default)]
    pub network_type: NetworkType,

    pub ip: Option<String>,

    pub netmask: Option<String>,

    pub gateway: Option<String>,

    #[serde(default)]
    pub dns: Vec<String>,

    /// Roles this network is the default for (`dns`, `gateway`)
    #[serde(default)]
    pub default: Vec<String>,

    #[serde(default)]
    pub cloud_properties: NetworkCloudProperties,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    #[default]
    Dynamic,
    Manual,
    Vip,
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Dynamic => write!(f, "dynamic"),
            NetworkType::Manual => write!(f, "manual"),
            NetworkType::Vip => write!(f, "vip"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCloudProperties {
    pub net_id: Option<String>,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// A resolved network entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,

    pub network_type: NetworkType,

    /// Backend network id (empty for VIP networks)
    pub net_id: String,

    pub ip: Option<String>,

    /// Port created for this network during provisioning
    pub port_id: Option<String>,
}

/// Effective network configuration for one VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network carrying the default gateway
    pub default_network: Network,

    /// Networks that need an explicitly created port
    pub manual_networks: Vec<Network>,

    /// Floating IP network, if one was requested
    pub vip_network: Option<Network>,

    pub security_groups: Vec<String>,
}

impl NetworkConfig {
    /// Record a created port on the manual network it belongs to, and on the
    /// default network when that is the same network.
    pub fn assign_port(&mut self, network_name: &str, port_id: &str) {
        for network in self
            .manual_networks
            .iter_mut()
            .filter(|n| n.name == network_name)
        {
            network.port_id = Some(port_id.to_string());
        }
        if self.default_network.name == network_name {
            self.default_network.port_id = Some(port_id.to_string());
        }
    }

    pub fn port_ids(&self) -> Vec<&str> {
        self.manual_networks
            .iter()
            .filter_map(|n| n.port_id.as_deref())
            .collect()
    }
}
