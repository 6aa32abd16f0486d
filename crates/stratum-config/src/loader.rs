use std::path::Path;

use crate::error::ConfigError;
use crate::raw::RawConfig;

/// Which [`StateStore`](stratum_store) backend the process constructs at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redb { path: String },
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceManagerConfig {
    pub store: StoreBackend,
    pub logging: LoggingConfig,
}

/// Load and validate the single YAML config file at `path`.
pub fn load_config(path: &Path) -> Result<ResourceManagerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    convert(raw, path)
}

fn convert(raw: RawConfig, path: &Path) -> Result<ResourceManagerConfig, ConfigError> {
    let store = match raw.store.backend.as_str() {
        "memory" => StoreBackend::Memory,
        "redb" => {
            let redb_path = raw.store.redb_path.ok_or_else(|| ConfigError::Conversion {
                path: path.display().to_string(),
                message: "redb_path is required when store.backend is 'redb'".to_string(),
            })?;
            StoreBackend::Redb { path: redb_path }
        }
        other => {
            return Err(ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("unknown store backend '{other}'"),
            })
        }
    };

    Ok(ResourceManagerConfig {
        store,
        logging: LoggingConfig { level: raw.logging.level, json: raw.logging.json },
    })
}
