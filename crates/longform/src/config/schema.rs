use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::BootstrapPolicy;
use crate::model::Severity;
use crate::secrets::SecretRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.longform/data/longform.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Root under which generated images are written.
    #[serde(default)]
    pub asset_directory: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            asset_directory: None,
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            consistency: ConsistencyConfig::default(),
            digest: DigestConfig::default(),
            pipeline: PipelineConfig::default(),
            media: MediaConfig::default(),
            storage: StorageConfig::default(),
            access: AccessConfig::default(),
            driver: DriverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(p) => Some(PathBuf::from(p)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn asset_directory(&self) -> Option<PathBuf> {
        match &self.asset_directory {
            Some(p) => Some(PathBuf::from(p)),
            None => dirs::home_dir().map(|h| h.join(".longform").join("assets")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn api_key_ref(&self) -> SecretRef {
        SecretRef {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env: self.api_key_env.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// In-step retry budget for transient provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// When a freshly written section is rewritten automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Severity at or above which a rewrite is triggered.
    #[serde(default = "default_rewrite_threshold")]
    pub rewrite_threshold: Severity,
    #[serde(default = "default_max_automatic_rewrites")]
    pub max_automatic_rewrites: u32,
}

fn default_rewrite_threshold() -> Severity {
    Severity::Contradiction
}

fn default_max_automatic_rewrites() -> u32 {
    1
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            rewrite_threshold: default_rewrite_threshold(),
            max_automatic_rewrites: default_max_automatic_rewrites(),
        }
    }
}

/// Size bounds for the prior-section digest sent with each section request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_digest_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_digest_per_section_chars")]
    pub per_section_chars: usize,
}

fn default_digest_max_chars() -> usize {
    6000
}

fn default_digest_per_section_chars() -> usize {
    600
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_chars: default_digest_max_chars(),
            per_section_chars: default_digest_per_section_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run the media top-up as a job step after integration.
    #[serde(default)]
    pub run_media_step: bool,
    /// How long `advance` waits for another caller holding the same job.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

fn default_lock_wait_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_media_step: false,
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// `WIDTHxHEIGHT`, the form image endpoints expect.
    pub fn as_param(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Delay between consecutive diagram requests.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_banner_size")]
    pub banner_size: ImageSize,
    #[serde(default = "default_diagram_size")]
    pub diagram_size: ImageSize,
}

fn default_pacing_ms() -> u64 {
    1500
}

fn default_banner_size() -> ImageSize {
    ImageSize {
        width: 1536,
        height: 1024,
    }
}

fn default_diagram_size() -> ImageSize {
    ImageSize {
        width: 1024,
        height: 1024,
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            banner_size: default_banner_size(),
            diagram_size: default_diagram_size(),
        }
    }
}

impl MediaConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_bootstrap_attempts")]
    pub bootstrap_attempts: u32,
    #[serde(default = "default_bootstrap_backoff_ms")]
    pub bootstrap_backoff_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_bootstrap_attempts() -> u32 {
    5
}

fn default_bootstrap_backoff_ms() -> u64 {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            bootstrap_attempts: default_bootstrap_attempts(),
            bootstrap_backoff_ms: default_bootstrap_backoff_ms(),
        }
    }
}

impl StorageConfig {
    pub fn bootstrap_policy(&self) -> BootstrapPolicy {
        BootstrapPolicy {
            attempts: self.bootstrap_attempts,
            initial_backoff: Duration::from_millis(self.bootstrap_backoff_ms),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Documents an actor may create per UTC day.
    pub daily_jobs: u32,
    /// Upper bound on a document's `targetChars`.
    pub char_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_plans")]
    pub plans: BTreeMap<String, PlanConfig>,
    /// Actor id to plan name.
    #[serde(default)]
    pub actors: BTreeMap<String, String>,
    #[serde(default = "default_plan_name")]
    pub default_plan: String,
}

fn default_plans() -> BTreeMap<String, PlanConfig> {
    let mut plans = BTreeMap::new();
    plans.insert(
        "free".to_string(),
        PlanConfig {
            daily_jobs: 3,
            char_limit: 20_000,
        },
    );
    plans.insert(
        "pro".to_string(),
        PlanConfig {
            daily_jobs: 50,
            char_limit: 100_000,
        },
    );
    plans
}

fn default_plan_name() -> String {
    "free".to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            plans: default_plans(),
            actors: BTreeMap::new(),
            default_plan: default_plan_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DriverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.consistency.rewrite_threshold, Severity::Contradiction);
        assert_eq!(config.consistency.max_automatic_rewrites, 1);
        assert!(!config.pipeline.run_media_step);
        assert!(config.access.plans.contains_key(&config.access.default_plan));
    }

    #[test]
    fn test_bootstrap_policy_conversion() {
        let storage = StorageConfig {
            busy_timeout_ms: 250,
            bootstrap_attempts: 2,
            bootstrap_backoff_ms: 10,
        };
        let policy = storage.bootstrap_policy();
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(policy.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_api_key_ref_carries_all_sources() {
        let provider = ProviderConfig {
            api_key_file: Some("/run/secrets/key".to_string()),
            ..Default::default()
        };
        let key = provider.api_key_ref();
        assert_eq!(key.file.as_deref(), Some("/run/secrets/key"));
        assert_eq!(key.env.as_deref(), Some("OPENAI_API_KEY"));
        assert!(key.value.is_none());
    }

    #[test]
    fn test_image_size_param() {
        assert_eq!(default_banner_size().as_param(), "1536x1024");
    }
}
