//! Generation provider abstraction.
//!
//! The pipeline talks to a text/image model only through [`GenerationProvider`].
//! [`HttpProvider`] targets an OpenAI-compatible API; [`ScriptedProvider`] is a
//! deterministic offline stand-in used by tests and `--offline` runs.

pub mod error;
pub mod http;
pub mod retry;
pub mod scripted;

pub use error::ProviderError;
pub use http::HttpProvider;
pub use retry::RetryPolicy;
pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ImageSize;

/// What a request is for. Used for logging and by the scripted provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Outline,
    Research,
    Section,
    Consistency,
    Table,
    DiagramProposals,
    Banner,
    Diagram,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Research => "research",
            Self::Section => "section",
            Self::Consistency => "consistency",
            Self::Table => "table",
            Self::DiagramProposals => "diagram_proposals",
            Self::Banner => "banner",
            Self::Diagram => "diagram",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    Text,
    /// A JSON object is expected; `schema_hint` describes it to the model.
    Json { schema_hint: String },
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub purpose: Purpose,
    /// Short subject of the request (a heading, a competitor), for logs.
    pub label: String,
    pub system: String,
    pub prompt: String,
    pub shape: ResponseShape,
}

impl GenerationRequest {
    pub fn text(purpose: Purpose, label: impl Into<String>, system: &str, prompt: String) -> Self {
        Self {
            purpose,
            label: label.into(),
            system: system.to_string(),
            prompt,
            shape: ResponseShape::Text,
        }
    }

    pub fn json(
        purpose: Purpose,
        label: impl Into<String>,
        system: &str,
        prompt: String,
        schema_hint: &str,
    ) -> Self {
        Self {
            purpose,
            label: label.into(),
            system: system.to_string(),
            prompt,
            shape: ResponseShape::Json {
                schema_hint: schema_hint.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl GenerationOutput {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }

    /// Structured payload, parsing text output (optionally fenced) when needed.
    pub fn into_json(self) -> Result<serde_json::Value, ProviderError> {
        match self {
            Self::Structured(value) => Ok(value),
            Self::Text(text) => serde_json::from_str(strip_code_fence(&text))
                .map_err(|e| ProviderError::InvalidOutput(format!("expected JSON: {}", e))),
        }
    }

    /// Deserializes the structured payload into `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(self) -> Result<T, ProviderError> {
        let value = self.into_json()?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidOutput(format!("unexpected JSON shape: {}", e)))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub purpose: Purpose,
    pub label: String,
    pub prompt: String,
    pub size: ImageSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationOutput, ProviderError>;

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError>;
}
