//! Deterministic offline provider.
//!
//! Every request gets a canned answer of the right shape unless a rule registered
//! for its purpose returns something else. Rules see the request and the 1-based
//! count of calls made so far for that purpose, which makes "fail the fourth
//! section" or "rate-limit twice, then succeed" easy to express.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{
    GeneratedImage, GenerationOutput, GenerationProvider, GenerationRequest, ImageRequest,
    ProviderError, Purpose,
};

type TextRule =
    Box<dyn Fn(&GenerationRequest, u32) -> Option<Result<GenerationOutput, ProviderError>> + Send + Sync>;
type ImageRule =
    Box<dyn Fn(&ImageRequest, u32) -> Option<Result<GeneratedImage, ProviderError>> + Send + Sync>;

/// 1x1 transparent PNG.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub purpose: Purpose,
    pub label: String,
}

#[derive(Default)]
struct ScriptState {
    counts: HashMap<Purpose, u32>,
    calls: Vec<RecordedCall>,
}

#[derive(Default)]
pub struct ScriptedProvider {
    text_rules: Vec<(Purpose, TextRule)>,
    image_rules: Vec<ImageRule>,
    latency: Option<Duration>,
    state: Mutex<ScriptState>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule for one purpose. Earlier rules win; `None` falls through.
    pub fn on<F>(mut self, purpose: Purpose, rule: F) -> Self
    where
        F: Fn(&GenerationRequest, u32) -> Option<Result<GenerationOutput, ProviderError>>
            + Send
            + Sync
            + 'static,
    {
        self.text_rules.push((purpose, Box::new(rule)));
        self
    }

    pub fn on_image<F>(mut self, rule: F) -> Self
    where
        F: Fn(&ImageRequest, u32) -> Option<Result<GeneratedImage, ProviderError>>
            + Send
            + Sync
            + 'static,
    {
        self.image_rules.push(Box::new(rule));
        self
    }

    /// Sleeps this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, purpose: Purpose) -> u32 {
        self.state
            .lock()
            .map(|s| s.counts.get(&purpose).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Labels of the calls made for one purpose, in order.
    pub fn labels_for(&self, purpose: Purpose) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.purpose == purpose)
            .map(|c| c.label)
            .collect()
    }

    fn record(&self, purpose: Purpose, label: &str) -> u32 {
        match self.state.lock() {
            Ok(mut state) => {
                let count = state.counts.entry(purpose).or_insert(0);
                *count += 1;
                let n = *count;
                state.calls.push(RecordedCall {
                    purpose,
                    label: label.to_string(),
                });
                n
            }
            Err(_) => 0,
        }
    }
}

/// The answer an unscripted request gets.
pub fn canned_response(request: &GenerationRequest) -> GenerationOutput {
    let label = request.label.as_str();
    match request.purpose {
        Purpose::Outline => GenerationOutput::Structured(json!({
            "title": label,
            "sections": [
                { "heading": "Introduction" },
                { "heading": "Background" },
                { "heading": "Core concepts" },
                { "heading": "Practical guidance" },
                { "heading": "Conclusion" }
            ]
        })),
        Purpose::Consistency => {
            GenerationOutput::Structured(json!({ "severity": "none", "findings": [] }))
        }
        Purpose::DiagramProposals => GenerationOutput::Structured(json!({
            "diagrams": [
                { "title": "Process overview", "description": format!("End-to-end flow of {}", label) },
                { "title": "Key components", "description": "Main parts and how they relate" },
                { "title": "Decision flow", "description": "Choices a reader faces, in order" }
            ]
        })),
        Purpose::Section => GenerationOutput::Text(format!(
            "This part covers {}. It is an offline draft written without a model.",
            label
        )),
        Purpose::Research => GenerationOutput::Text(format!("Offline notes on {}.", label)),
        Purpose::Table => GenerationOutput::Text(format!(
            "| Option | Notes |\n| --- | --- |\n| {} | offline |",
            label
        )),
        Purpose::Banner | Purpose::Diagram => GenerationOutput::Text(String::new()),
    }
}

pub fn placeholder_image(request: &ImageRequest) -> GeneratedImage {
    GeneratedImage {
        bytes: PLACEHOLDER_PNG.to_vec(),
        mime_type: "image/png".to_string(),
        width: request.size.width,
        height: request.size.height,
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let n = self.record(request.purpose, &request.label);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        for (purpose, rule) in &self.text_rules {
            if *purpose == request.purpose {
                if let Some(result) = rule(request, n) {
                    return result;
                }
            }
        }
        Ok(canned_response(request))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let n = self.record(request.purpose, &request.label);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        for rule in &self.image_rules {
            if let Some(result) = rule(request, n) {
                return result;
            }
        }
        Ok(placeholder_image(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageSize;

    fn section_request(label: &str) -> GenerationRequest {
        GenerationRequest::text(Purpose::Section, label, "system", "prompt".to_string())
    }

    #[tokio::test]
    async fn test_canned_outline_is_structured() {
        let provider = ScriptedProvider::new();
        let request = GenerationRequest::json(
            Purpose::Outline,
            "Tide pools",
            "system",
            "prompt".to_string(),
            "{}",
        );
        let output = provider.generate(&request).await.unwrap();
        let value = output.into_json().unwrap();
        assert_eq!(value["title"], "Tide pools");
        assert_eq!(value["sections"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_rule_sees_per_purpose_count() {
        let provider = ScriptedProvider::new().on(Purpose::Section, |_, n| {
            (n == 2).then(|| Err(ProviderError::Outage("down".into())))
        });

        assert!(provider.generate(&section_request("a")).await.is_ok());
        assert!(provider.generate(&section_request("b")).await.is_err());
        assert!(provider.generate(&section_request("c")).await.is_ok());
        assert_eq!(provider.call_count(Purpose::Section), 3);
        assert_eq!(provider.labels_for(Purpose::Section), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_image_rules() {
        let provider = ScriptedProvider::new().on_image(|req, _| {
            (req.label == "bad").then(|| Err(ProviderError::InvalidOutput("nope".into())))
        });
        let size = ImageSize {
            width: 64,
            height: 32,
        };
        let ok = ImageRequest {
            purpose: Purpose::Banner,
            label: "good".to_string(),
            prompt: "p".to_string(),
            size,
        };
        let bad = ImageRequest {
            label: "bad".to_string(),
            ..ok.clone()
        };

        let image = provider.generate_image(&ok).await.unwrap();
        assert_eq!(image.width, 64);
        assert_eq!(&image.bytes[1..4], b"PNG");
        assert!(provider.generate_image(&bad).await.is_err());
        assert_eq!(provider.call_count(Purpose::Banner), 2);
    }
}
