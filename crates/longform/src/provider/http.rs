//! OpenAI-compatible HTTP provider.
//!
//! Speaks the `chat/completions` and `images/generations` endpoints. Retries are
//! not done here; callers wrap requests in a [`RetryPolicy`](super::RetryPolicy).

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{
    GeneratedImage, GenerationOutput, GenerationProvider, GenerationRequest, ImageRequest,
    ProviderError, ResponseShape,
};
use crate::config::ProviderConfig;

pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
    text_model: String,
    image_model: String,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: String,
    n: u32,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig, api_key: SecretString) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ProviderError::Misconfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Builds the provider, resolving the API key from the configured sources.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key_ref().resolve().map_err(|e| {
            ProviderError::Misconfiguration(format!("API key unavailable: {}", e))
        })?;
        Self::new(config, api_key)
    }

    async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::InvalidOutput(format!("Malformed response body: {}", e)))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                duration: self.request_timeout,
            }
        } else {
            // without_url keeps query strings out of messages
            ProviderError::Transport(e.without_url().to_string())
        }
    }
}

/// Maps a non-success status to an error variant.
fn map_status(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Auth(format!("provider returned {}", status))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimited(format!("provider returned {}", status))
        }
        StatusCode::REQUEST_TIMEOUT => ProviderError::Transport(format!("provider returned {}", status)),
        s if s.is_server_error() => ProviderError::Outage(format!("provider returned {}", status)),
        _ => ProviderError::Misconfiguration(format!("provider rejected request: {}", status)),
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let system = match &request.shape {
            ResponseShape::Text => request.system.clone(),
            ResponseShape::Json { schema_hint } => format!(
                "{}\n\nRespond with a single JSON object of this shape:\n{}",
                request.system, schema_hint
            ),
        };
        let json_mode = matches!(request.shape, ResponseShape::Json { .. });

        let body = ChatRequest {
            model: &self.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(
            purpose = request.purpose.as_str(),
            label = %request.label,
            model = %self.text_model,
            "Sending generation request"
        );

        let response: ChatResponse = self.post_json("chat/completions", &body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidOutput("empty completion".to_string()))?;

        if json_mode {
            GenerationOutput::Text(content)
                .into_json()
                .map(GenerationOutput::Structured)
        } else {
            Ok(GenerationOutput::Text(content))
        }
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let body = ImageGenerationRequest {
            model: &self.image_model,
            prompt: &request.prompt,
            size: request.size.as_param(),
            n: 1,
        };

        debug!(
            purpose = request.purpose.as_str(),
            label = %request.label,
            model = %self.image_model,
            "Sending image request"
        );

        let response: ImageGenerationResponse = self.post_json("images/generations", &body).await?;
        let encoded = response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| ProviderError::InvalidOutput("image response had no data".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderError::InvalidOutput(format!("image payload not base64: {}", e)))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: "image/png".to_string(),
            width: request.size.width,
            height: request.size.height,
        })
    }
}
