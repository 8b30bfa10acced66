use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Remote text generation used for classification fallback and narration.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            cfg.gemini_base_url.clone(),
            cfg.gemini_model.clone(),
            Some(cfg.gemini_api_key.clone()),
            cfg.llm_timeout(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError("language model API key is not configured".into())
        })?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let start = Instant::now();
        counter!("retail_insights.llm.requests", 1);
        debug!(model = %self.model, prompt_len = prompt.len(), "Calling language model");

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                counter!("retail_insights.llm.failures", 1);
                warn!("Language model request failed: {}", e);
                ServiceError::ExternalServiceError(format!("language model request failed: {}", e))
            })?;

        histogram!("retail_insights.llm.latency", start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            counter!("retail_insights.llm.failures", 1);
            warn!("Language model returned {}", status);
            return Err(ServiceError::ExternalServiceError(format!(
                "language model returned {}",
                status
            )));
        }

        let payload: GenerateResponse = response.json().await.map_err(|e| {
            counter!("retail_insights.llm.failures", 1);
            ServiceError::ExternalServiceError(format!("malformed language model response: {}", e))
        })?;

        payload.first_text().ok_or_else(|| {
            counter!("retail_insights.llm.failures", 1);
            ServiceError::ExternalServiceError("language model returned no candidates".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text() {
        let payload: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "sku"}, {"text": "ignored"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(payload.first_text().as_deref(), Some("sku"));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let payload: GenerateResponse =
            serde_json::from_value(serde_json::json!({"promptFeedback": {}})).unwrap();
        assert!(payload.first_text().is_none());
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let client = GeminiClient::new(
            "http://127.0.0.1:1",
            "gemini-pro",
            Some("  ".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let client = GeminiClient::new(
            "https://example.test/",
            "gemini-pro",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-pro:generateContent"
        );
    }
}
