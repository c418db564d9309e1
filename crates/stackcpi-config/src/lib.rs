pub mod cpi;
pub mod error;

pub use cpi::{AuthMethod, ConfigDrive, CpiConfig, Credentials, OpenstackProperties};
pub use error::*;

use std::path::PathBuf;

const CONFIG_FILE: &str = "cpi.json";

/// CPI設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 STACKCPI_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: cpi.json
/// 3. ./.stackcpi/ ディレクトリ内: cpi.json
/// 4. ~/.config/stackcpi/cpi.json (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACKCPI_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let path = current_dir.join(CONFIG_FILE);
        if path.exists() {
            return Ok(path);
        }

        let path = current_dir.join(".stackcpi").join(CONFIG_FILE);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackcpi").join(CONFIG_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 設定ファイルを探して読み込む
pub fn load_config() -> Result<CpiConfig> {
    let path = find_config_file()?;
    CpiConfig::load(path)
}
