//! CPI設定
//!
//! 設定ファイルはディレクターが書き出すエンベロープで
//! OpenStackプロパティを包んでいる:
//!
//! ```json
//! {"cloud": {"plugin": "openstack", "properties": {"openstack": {...}}}}
//! ```
//!
//! [`OpenstackProperties`] はデシリアライズしただけの生の形。
//! [`CpiConfig`] は検証済みの値で、オーケストレーターに渡した後は変更しない。

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use stackcpi_cloud::{RetryConfig, RetryPolicies};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const PLUGIN_NAME: &str = "openstack";

fn default_state_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    3
}

/// コンフィグドライブをVMに見せる方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDrive {
    /// ブロックデバイス（デバイス文字を1つ消費する）
    Disk,
    Cdrom,
}

impl ConfigDrive {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "disk" => Ok(Self::Disk),
            "cdrom" => Ok(Self::Cdrom),
            other => Err(ConfigError::InvalidConfigDrive(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConfigDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigDrive::Disk => write!(f, "disk"),
            ConfigDrive::Cdrom => write!(f, "cdrom"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    cloud: CloudSection,
}

#[derive(Debug, Deserialize)]
struct CloudSection {
    plugin: String,
    properties: CloudProperties,
}

#[derive(Debug, Deserialize)]
struct CloudProperties {
    openstack: OpenstackProperties,
}

/// 設定ファイルに書かれた `cloud.properties.openstack`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenstackProperties {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub tenant: Option<String>,
    pub project: Option<String>,
    pub domain: Option<String>,
    pub region: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,

    /// ステータス遷移を待つ秒数
    #[serde(default = "default_state_timeout")]
    pub state_timeout: u64,

    /// ステータスポーリングの間隔（秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    pub config_drive: Option<String>,

    #[serde(default)]
    pub ignore_server_availability_zone: bool,

    pub default_volume_type: Option<String>,

    #[serde(default)]
    pub boot_from_volume: bool,

    /// メタデータ設定時にサーバー名をジョブ名に合わせて変更する
    #[serde(default)]
    pub human_readable_vm_names: bool,

    #[serde(default)]
    pub retry_config: HashMap<String, RetryConfig>,
}

/// サービスファクトリが認証に使う資格情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub auth_url: String,
    pub auth: AuthMethod,
    /// プロジェクト名（旧tenant）
    pub project: Option<String>,
    pub domain: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthMethod {
    #[default]
    None,
    Password { username: String, api_key: String },
    ApplicationCredential { id: String, secret: String },
}

/// 検証済みのCPI設定
#[derive(Debug, Clone)]
pub struct CpiConfig {
    pub credentials: Credentials,
    pub state_timeout: Duration,
    pub poll_interval: Duration,
    pub config_drive: Option<ConfigDrive>,
    pub ignore_server_availability_zone: bool,
    pub default_volume_type: Option<String>,
    pub boot_from_volume: bool,
    pub human_readable_vm_names: bool,
    pub retry_policies: RetryPolicies,
}

impl Default for CpiConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            state_timeout: Duration::from_secs(default_state_timeout()),
            poll_interval: Duration::from_secs(default_poll_interval()),
            config_drive: None,
            ignore_server_availability_zone: false,
            default_volume_type: None,
            boot_from_volume: false,
            human_readable_vm_names: false,
            retry_policies: RetryPolicies::default(),
        }
    }
}

impl CpiConfig {
    /// 設定ファイルを読み込んで検証
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// 設定ファイルのエンベロープをパースして検証
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;
        if file.cloud.plugin != PLUGIN_NAME {
            return Err(ConfigError::UnsupportedPlugin(file.cloud.plugin));
        }
        Self::from_properties(file.cloud.properties.openstack)
    }

    /// 生のプロパティを検証（リモート呼び出しより前に失敗させる）
    pub fn from_properties(props: OpenstackProperties) -> Result<Self> {
        let credentials = validate_credentials(&props)?;

        if props.state_timeout == 0 {
            return Err(ConfigError::InvalidProperty {
                name: "state_timeout",
                reason: "must be greater than 0".to_string(),
            });
        }
        if props.poll_interval == 0 {
            return Err(ConfigError::InvalidProperty {
                name: "poll_interval",
                reason: "must be greater than 0".to_string(),
            });
        }

        let config_drive = props
            .config_drive
            .as_deref()
            .map(ConfigDrive::parse)
            .transpose()?;

        if let Some((name, _)) = props.retry_config.iter().find(|(_, c)| c.max_attempts == 0) {
            return Err(ConfigError::InvalidProperty {
                name: "retry_config",
                reason: format!("max_attempts for '{}' must be at least 1", name),
            });
        }

        Ok(Self {
            credentials,
            state_timeout: Duration::from_secs(props.state_timeout),
            poll_interval: Duration::from_secs(props.poll_interval),
            config_drive,
            ignore_server_availability_zone: props.ignore_server_availability_zone,
            default_volume_type: props.default_volume_type,
            boot_from_volume: props.boot_from_volume,
            human_readable_vm_names: props.human_readable_vm_names,
            retry_policies: RetryPolicies::from(props.retry_config),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn validate_credentials(props: &OpenstackProperties) -> Result<Credentials> {
    let auth_url = non_empty(&props.auth_url).ok_or(ConfigError::MissingProperty("auth_url"))?;

    let password = match (non_empty(&props.username), non_empty(&props.api_key)) {
        (Some(username), Some(api_key)) => Some(AuthMethod::Password {
            username: username.to_string(),
            api_key: api_key.to_string(),
        }),
        (Some(_), None) => return Err(ConfigError::MissingProperty("api_key")),
        (None, Some(_)) => return Err(ConfigError::MissingProperty("username")),
        (None, None) => None,
    };

    let app_credential = match (
        non_empty(&props.application_credential_id),
        non_empty(&props.application_credential_secret),
    ) {
        (Some(id), Some(secret)) => Some(AuthMethod::ApplicationCredential {
            id: id.to_string(),
            secret: secret.to_string(),
        }),
        (Some(_), None) => {
            return Err(ConfigError::MissingProperty(
                "application_credential_secret",
            ));
        }
        (None, Some(_)) => return Err(ConfigError::MissingProperty("application_credential_id")),
        (None, None) => None,
    };

    let auth = match (password, app_credential) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Conflict(
                "username/api_key and application_credential_id/application_credential_secret are mutually exclusive"
                    .to_string(),
            ));
        }
        (Some(auth), None) | (None, Some(auth)) => auth,
        (None, None) => {
            return Err(ConfigError::MissingProperty(
                "username/api_key or application_credential_id/application_credential_secret",
            ));
        }
    };

    let project = match (non_empty(&props.tenant), non_empty(&props.project)) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Conflict(
                "tenant and project are mutually exclusive".to_string(),
            ));
        }
        (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
        (None, None) => None,
    };

    let keystone_v3 = auth_url.trim_end_matches('/').ends_with("/v3");
    if keystone_v3 && matches!(auth, AuthMethod::Password { .. }) {
        if non_empty(&props.domain).is_none() {
            return Err(ConfigError::MissingProperty("domain"));
        }
        if project.is_none() {
            return Err(ConfigError::MissingProperty("project"));
        }
    }

    Ok(Credentials {
        auth_url: auth_url.to_string(),
        auth,
        project,
        domain: non_empty(&props.domain).map(str::to_string),
        region: non_empty(&props.region).map(str::to_string),
    })
}
