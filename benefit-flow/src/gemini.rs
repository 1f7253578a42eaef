//! Gemini `generateContent` client implementing [`Gateway`].
//!
//! The API key travels as the `key` query parameter, so transport errors are
//! stripped of their URL before they are logged or surfaced.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::BenefitRecord,
    category::Category,
    error::{BenefitsError, Result},
    gateway::{Gateway, action_plan_prompt, classification_prompt, clean_response},
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Connection and generation settings for the Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub plan_max_output_tokens: u32,
    pub plan_temperature: f32,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("plan_max_output_tokens", &self.plan_max_output_tokens)
            .field("plan_temperature", &self.plan_temperature)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            plan_max_output_tokens: 800,
            plan_temperature: 0.4,
        }
    }

    /// Reads `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_BASE_URL` and `GEMINI_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| BenefitsError::Configuration("GEMINI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(secs) = std::env::var("GEMINI_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                BenefitsError::Configuration(format!("GEMINI_TIMEOUT_SECS: {}", e))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GenerateContentResponse {
    /// Text at `candidates[0].content.parts[0].text`
    fn into_first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
    }
}

/// Gateway backed by the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    config: GeminiConfig,
    client: Client,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(BenefitsError::Configuration(
                "Gemini API key is empty".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BenefitsError::Configuration(e.without_url().to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn generate(
        &self,
        prompt: String,
        generation_config: Option<GenerationConfig>,
    ) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(model = %self.config.model, error = %e, "Gemini request failed");
                BenefitsError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %self.config.model, %status, "Gemini returned non-success status");
            debug!(body = %body, "Gemini error body");
            return Err(BenefitsError::UpstreamUnavailable(format!(
                "status {}",
                status
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            warn!(model = %self.config.model, error = %e, "Malformed Gemini response body");
            BenefitsError::UpstreamUnavailable(format!("malformed response body: {}", e))
        })?;

        let text = body.into_first_text().ok_or_else(|| {
            warn!(model = %self.config.model, "Gemini response carried no candidate text");
            BenefitsError::UpstreamUnavailable("response contained no candidate text".to_string())
        })?;

        debug!(raw = %text, "Gemini raw response");
        Ok(text)
    }
}

#[async_trait]
impl Gateway for GeminiGateway {
    async fn classify(&self, user_text: &str) -> Result<Category> {
        info!(model = %self.config.model, "Classifying health concern");

        let raw = self.generate(classification_prompt(user_text), None).await?;
        let cleaned = clean_response(&raw);
        let category = cleaned.parse::<Category>().inspect_err(|_| {
            warn!(answer = %cleaned, "Model answered outside the category list");
        })?;

        info!(category = %category, "Health concern classified");
        Ok(category)
    }

    async fn generate_plan(&self, benefit: &BenefitRecord) -> Result<String> {
        info!(
            model = %self.config.model,
            benefit_id = %benefit.id,
            "Generating action plan"
        );

        let generation_config = GenerationConfig {
            max_output_tokens: self.config.plan_max_output_tokens,
            temperature: self.config.plan_temperature,
        };
        let raw = self
            .generate(action_plan_prompt(benefit), Some(generation_config))
            .await?;

        Ok(clean_response(&raw))
    }
}
