//! OpenAI Chat Completions API driver.
//!
//! Implements [`CompletionProvider`] with a single non-streaming request to
//! the provider's chat completions endpoint.

use anyhow::Context;

use super::{CompletionProvider, LlmSettings, Message};

/// Driver for the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Settings this driver was built with.
    #[must_use]
    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn request_body(&self, messages: &[Message]) -> serde_json::Value {
        serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ChatCompletionsDriver {
    async fn complete(&self, messages: Vec<Message>) -> anyhow::Result<String> {
        let url = self
            .settings
            .provider
            .build_chat_url(&self.settings.base_url);
        let body = self.request_body(&messages);

        let mut rb = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", key)
            } else {
                rb.bearer_auth(key)
            };
        }

        tracing::debug!(url = %url, messages = messages.len(), "Requesting completion");

        let resp = rb
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()?;
        let payload: serde_json::Value = resp
            .json()
            .await
            .context("completion response was not JSON")?;

        extract_content(&payload)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(payload: &serde_json::Value) -> anyhow::Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow::anyhow!("completion response has no message content"))
}
