//! LLM completion client.
//!
//! Every stage that talks to a model does so through [`LlmClient`], which is
//! constructed once by the caller and passed down explicitly:
//! - [`OpenRouterClient`]: OpenAI-compatible chat completions over HTTP

mod openrouter;

use async_trait::async_trait;

use coachkb_shared::Result;

pub use openrouter::OpenRouterClient;

/// A single-turn chat completion capability.
///
/// Implementations fail with [`coachkb_shared::CoachKbError::MalformedResponse`]
/// when the provider answers without the expected message content.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `user_prompt` under `system_prompt` and return the reply text.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
