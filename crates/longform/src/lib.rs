pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod gate;
pub mod intake;
pub mod logging;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod secrets;
pub mod storage;

pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use driver::JobDriver;
pub use error::{AccessError, ConfigError, LongformError, Result, StorageError};
pub use gate::{AccessGate, GateDecision, OpenGate, PlanAccessGate};
pub use intake::{create_document, DocumentRequest};
pub use media::{MediaError, MediaOrchestrator};
pub use model::{Asset, AssetKind, Document, Job, JobSnapshot, JobStatus, Section, SectionStatus, Step, Topology};
pub use pipeline::{IntegrationError, Orchestrator, PipelineError, PipelineSettings};
pub use provider::{GenerationProvider, HttpProvider, ProviderError, RetryPolicy, ScriptedProvider};
pub use secrets::{resolve_secret, SecretError};
pub use storage::{AssetStorage, FileStorage};
