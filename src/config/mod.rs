pub mod arm_config;
pub mod bluetooth_config;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::arm_config::ArmConfig;
use crate::config::bluetooth_config::BluetoothConfig;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "droctopus-bridge";
const CONFIG_FILE_NAME: &str = "bridge_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bluetooth: BluetoothConfig,
    pub arm: ArmConfig,
}

impl AppConfig {
    /// `<config dir>/droctopus-bridge/bridge_config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("No configuration directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file, falling back to defaults when it is missing.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        let file_path_str = file_path.to_string_lossy().into_owned();

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }
        let file_path_str = file_path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Config saved to {:?}.", file_path_str);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(test: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("droctopus-bridge-{}-{}", test, std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let path = scratch_path("missing");
        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bluetooth.receiver.name, "ESP32_Receiver");
        assert_eq!(config.arm.baud_rate, 115_200);
    }

    #[tokio::test]
    async fn saved_config_is_loaded_back() {
        let path = scratch_path("saved");
        let mut config = AppConfig::default();
        config.arm.step = 0.25;
        config.bluetooth.sender.name = "Glove".to_string();

        config.save_config(&path).await.unwrap();
        let loaded = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"arm": {"step": 0.5}}"#).unwrap();
        assert_eq!(config.arm.step, 0.5);
        assert_eq!(config.arm.acceleration, 10);
        assert_eq!(config.bluetooth, BluetoothConfig::default());
    }
}
