use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LongformError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] crate::media::MediaError),

    #[error("Access denied: {0}")]
    Access(#[from] AccessError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Section '{0}' not found")]
    SectionNotFound(String),

    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    #[error("Invalid document request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unknown plan '{plan}' referenced by {referenced_by}")]
    UnknownPlan { plan: String, referenced_by: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid asset path component: {0}")]
    InvalidPath(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("{reason}")]
    Denied { reason: String },

    #[error("Requested {requested} characters exceeds the plan limit of {limit}")]
    CharLimitExceeded { requested: u32, limit: u32 },
}

pub type Result<T> = std::result::Result<T, LongformError>;
