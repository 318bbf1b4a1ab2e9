//! LLM completion client.
//!
//! Agents need exactly one thing from a language model: "given this message
//! list, produce the next assistant reply". The [`CompletionProvider`] trait
//! captures that, and [`ChatCompletionsDriver`] implements it against any
//! OpenAI-compatible `/chat/completions` endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use persona_duet::llm::{ChatCompletionsDriver, CompletionProvider, Message};
//!
//! let driver = ChatCompletionsDriver::new(settings);
//! let reply = driver
//!     .complete(vec![Message::system("Be brief."), Message::user("Hi!")])
//!     .await?;
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;

/// Default sampling temperature for agent replies.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion length. Short replies keep the dialogue snappy.
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o`).
    pub model: String,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in a completion.
    pub max_tokens: u32,
}

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    /// System prompt message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// Generates a completion for a message list.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync + std::fmt::Debug {
    /// Return the assistant's reply to `messages`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no content.
    async fn complete(&self, messages: Vec<Message>) -> anyhow::Result<String>;
}
