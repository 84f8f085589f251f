//! Vertex AI generateContent client.
//!
//! Stateless request/response wrapper over the `generateContent` endpoint:
//! one blocking call per prompt, no streaming, no retries. Generation
//! failures are surfaced as errors; the caller decides whether to degrade to
//! a canned reply.
//!
//! Configuration:
//! - `VERTEX_API_BASE_URL`: API base URL override (default: `https://{location}-aiplatform.googleapis.com`)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use google_auth_module::{GoogleAuth, GoogleAuthError};

/// Timeout for generation requests.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Error types for generation calls.
#[derive(Debug, thiserror::Error)]
pub enum VertexError {
    #[error("auth error: {0}")]
    Auth(#[from] GoogleAuthError),
    #[error("http error: {0}")]
    Http(String),
    #[error("vertex api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("json error: {0}")]
    Json(String),
    #[error("empty response: no candidate text returned")]
    EmptyResponse,
}

/// Vertex AI client bound to one project, location and model.
#[derive(Debug, Clone)]
pub struct VertexClient {
    auth: GoogleAuth,
    project: String,
    location: String,
    model: String,
}

impl VertexClient {
    pub fn new(auth: GoogleAuth, project: &str, location: &str, model: &str) -> Self {
        Self {
            auth,
            project: project.to_string(),
            location: location.to_string(),
            model: model.to_string(),
        }
    }

    /// Generate a reply for `prompt`. Returns the first candidate's text
    /// parts, concatenated.
    pub fn generate(&self, prompt: &str) -> Result<String, VertexError> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.api_base_url(),
            self.project,
            self.location,
            self.model,
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("requesting generation from model {}", self.model);

        let client = reqwest::blocking::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .map_err(|e| VertexError::Http(e.to_string()))?;
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&request)
            .send()
            .map_err(|e| VertexError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("generation request failed: {} - {}", status, body);
            return Err(VertexError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let generated: GenerateContentResponse = response
            .json()
            .map_err(|e| VertexError::Json(e.to_string()))?;

        let text = generated
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(VertexError::EmptyResponse);
        }
        Ok(text)
    }

    fn api_base_url(&self) -> String {
        std::env::var("VERTEX_API_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}-aiplatform.googleapis.com", self.location))
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}
