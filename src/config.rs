use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    EcoDriveError,
    routing::{osrm::DEFAULT_OSRM_URL, scorer::MAX_ALTERNATIVES},
    telemetry::collector::REFRESH_RATE_MS,
};

const CONFIG_DIR_NAME: &str = "ecodrive";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the OSRM server used for route planning
    pub osrm_base_url: String,
    /// Number of alternative routes to request
    pub alternatives: u32,
    /// Interval between live result refreshes without new samples
    pub refresh_rate_ms: u64,
    /// Linear scoring model artifact; the heuristic backend is used when absent
    pub model_path: Option<PathBuf>,
    /// Feature scaler artifact; built-in defaults are used when absent
    pub scaler_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            osrm_base_url: DEFAULT_OSRM_URL.to_string(),
            alternatives: MAX_ALTERNATIVES,
            refresh_rate_ms: REFRESH_RATE_MS,
            model_path: None,
            scaler_path: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, EcoDriveError> {
        Ok(dirs::config_dir()
            .ok_or(EcoDriveError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Reads the config from the platform config directory, `Ok(None)` if there is none yet.
    pub fn from_local_file() -> Result<Option<Self>, EcoDriveError> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::from_path(&config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn from_path(config_path: &Path) -> Result<Option<Self>, EcoDriveError> {
        if !config_path.exists() {
            debug!("No config file at {:?}", config_path);
            return Ok(None);
        }

        let file = std::fs::File::open(config_path)
            .map_err(|e| EcoDriveError::ConfigIOError { source: e })?;
        let config = serde_json::from_reader(file)
            .map_err(|e| EcoDriveError::ConfigSerializeError { source: e })?;
        debug!("Loaded config from {:?}", config_path);
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<(), EcoDriveError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), EcoDriveError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EcoDriveError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| EcoDriveError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| EcoDriveError::ConfigSerializeError { source: e })
    }
}
