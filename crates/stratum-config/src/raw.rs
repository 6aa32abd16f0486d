use serde::{Deserialize, Serialize};

/// Raw YAML representation of the single config file a process loads at
/// startup (§6: `store`, `logging`).
#[derive(Debug, Deserialize, Serialize)]
pub struct RawConfig {
    pub store: RawStoreConfig,
    #[serde(default)]
    pub logging: RawLoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawStoreConfig {
    pub backend: String,
    pub redb_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawLoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for RawLoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), json: false }
    }
}

fn default_level() -> String {
    "info".to_string()
}
