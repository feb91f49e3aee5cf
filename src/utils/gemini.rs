use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

const FALLBACK_API_ERROR: &str = "Failed to get response from Google API";
const INVALID_RESPONSE: &str = "Invalid response from Google API";

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request error: {0}")]
    Request(reqwest::Error),

    #[error("{0}")]
    Api(String),

    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// The request URL carries the API key, so it is stripped from every transport error.
impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        GeminiError::Request(e.without_url())
    }
}

/// Anything that can turn a prompt into an answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeminiError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            generation: GenerationConfig::default(),
        })
    }

    fn request_url(&self, model: &str) -> Result<Url, GeminiError> {
        let base = self.endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!(
            "{}/v1beta/models/{}:generateContent",
            base,
            urlencoding::encode(model)
        ))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl AnswerGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeminiError> {
        let url = self.request_url(model)?;
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: self.generation.clone(),
        };

        info!(target: "gemini", model = model, prompt_chars = prompt.chars().count(), "Sending generateContent request");
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        debug!(target: "gemini", status = status.as_u16(), "Received response: {}", response_text);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&response_text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| FALLBACK_API_ERROR.to_string());
            error!(target: "gemini", status = status.as_u16(), "Gemini API error: {}", message);
            return Err(GeminiError::Api(message));
        }

        let parsed = serde_json::from_str::<GenerateContentResponse>(&response_text)?;
        let text = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|p| p.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| GeminiError::Api(INVALID_RESPONSE.to_string()))?;

        info!(target: "gemini", model = model, elapsed_ms = started.elapsed().as_millis() as u64, "Answer received");
        Ok(text)
    }
}
