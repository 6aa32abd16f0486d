mod loader;
mod logging;
mod raw;

pub mod error;

pub use error::ConfigError;
pub use loader::{load_config, LoggingConfig, ResourceManagerConfig, StoreBackend};
pub use logging::init_tracing;
