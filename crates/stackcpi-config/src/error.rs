use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Config file not found. Looked in:\n\
        - ./cpi.json\n\
        - ./.stackcpi/cpi.json\n\
        - ~/.config/stackcpi/cpi.json\n\
        or set STACKCPI_CONFIG_PATH to point at it"
    )]
    ConfigFileNotFound,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported cloud plugin '{0}', expected 'openstack'")]
    UnsupportedPlugin(String),

    #[error("Invalid config_drive '{0}', must be one of: disk, cdrom")]
    InvalidConfigDrive(String),

    #[error("Missing required property: {0}")]
    MissingProperty(&'static str),

    #[error("Conflicting properties: {0}")]
    Conflict(String),

    #[error("Invalid property {name}: {reason}")]
    InvalidProperty { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
