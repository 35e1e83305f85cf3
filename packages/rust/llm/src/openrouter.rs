//! OpenRouter (OpenAI-compatible) chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use coachkb_shared::{CoachKbError, LlmConfig, Result};

use crate::LlmClient;

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("coachkb/", env!("CARGO_PKG_VERSION"));

/// Chat completions client bound to one model.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenRouterClient {
    /// Build the HTTP client for `config` using `api_key`.
    pub fn open(config: &LlmConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CoachKbError::config("missing LLM API key"));
        }
        if config.model.trim().is_empty() {
            return Err(CoachKbError::config("missing LLM model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| CoachKbError::config(format!("invalid LLM API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoachKbError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
        })
    }

    /// Model ID sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoachKbError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoachKbError::Network(format!("{}: body read failed: {e}", self.endpoint)))?;

        if !status.is_success() {
            return Err(CoachKbError::Llm(format!("HTTP {status}: {}", snippet(&body))));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            CoachKbError::MalformedResponse(format!("{e} (got: {})", snippet(&body)))
        })?;

        let text = parsed.into_text()?;
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// First 200 characters of a response body, for error messages.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
}

impl ChatResponse {
    /// Pull the first choice's message content out of the response.
    fn into_text(self) -> Result<String> {
        if let Some(err) = self.error {
            return Err(CoachKbError::MalformedResponse(format!(
                "provider error: {}",
                err.message
            )));
        }

        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| {
                CoachKbError::MalformedResponse("response has no choices[0].message.content".into())
            })
    }
}
