//! OpenAI-compatible chat completions backend for the [`Oracle`] trait.

use super::{Oracle, Prompt};
use crate::config::Config;
use crate::error::DtmapError;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};

const TEMPERATURE: f32 = 0.3;

/// Oracle backed by a `/chat/completions` endpoint.
pub struct ChatOracle {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ChatOracle {
    /// Build a client from configuration. Fails if no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, DtmapError> {
        let api_key = config.require_api_key()?.to_string();
        let http = HttpClient::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| DtmapError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Oracle for ChatOracle {
    fn classify(&self, prompt: &Prompt) -> Result<String, DtmapError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: prompt.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| DtmapError::OracleTransport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            if let Ok(api_err) = serde_json::from_str::<ApiError>(&body) {
                return Err(DtmapError::OracleTransport(format!(
                    "API error ({}): {}",
                    status, api_err.error.message
                )));
            }
            return Err(DtmapError::OracleTransport(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| DtmapError::OracleTransport(format!("failed to parse response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| DtmapError::OracleTransport("no text content in response".into()))
    }

    fn backend_name(&self) -> &str {
        "chat-completions"
    }
}
