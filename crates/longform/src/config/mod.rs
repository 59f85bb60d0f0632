pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    AccessConfig, Config, ConsistencyConfig, DigestConfig, DriverConfig, ImageSize, LogFormat,
    LoggingConfig, MediaConfig, PipelineConfig, PlanConfig, ProviderConfig, RetryConfig,
    StorageConfig,
};
