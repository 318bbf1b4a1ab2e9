//! Personality-driven conversation agent.
//!
//! A [`ConversationAgent`] owns one short-term and one long-term memory
//! store. For every incoming message it:
//!
//! 1. embeds the message and records it in both stores,
//! 2. pulls the most recent turns and the most relevant past turns,
//! 3. builds a system prompt from its personality and that context,
//! 4. asks the completion provider for a reply,
//! 5. embeds and records the reply the same way.
//!
//! Embedding and completion are injected as trait objects so agents can be
//! driven by real models or by test doubles.

pub mod personality;
pub mod prompt;

pub use personality::Personality;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Context;
use chrono::Local;
use tracing::instrument;

use crate::embedding::Embedder;
use crate::llm::{CompletionProvider, Message};
use crate::memory::{
    DEFAULT_CAPACITY, DEFAULT_EMBEDDING_DIM, LongTermMemory, Memory, ShortTermMemory,
};
use crate::moves::MoveCatalog;

/// Importance assigned to every conversation turn.
const TURN_IMPORTANCE: f32 = 1.0;

/// Memory and retrieval knobs for an agent.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Short-term buffer capacity.
    pub short_term_capacity: usize,
    /// Long-term embedding dimension; must match the embedder.
    pub embedding_dim: usize,
    /// Recent turns included in the prompt.
    pub recent_window: usize,
    /// Relevant past turns included in the prompt.
    pub relevant_k: usize,
    /// Moves to pick from for each reply. `None` disables moves.
    pub moves: Option<Arc<MoveCatalog>>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            short_term_capacity: DEFAULT_CAPACITY,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            recent_window: 5,
            relevant_k: 3,
            moves: None,
        }
    }
}

/// One side of a simulated conversation.
pub struct ConversationAgent {
    original_personality: Personality,
    personality: RwLock<Personality>,
    current_context: Mutex<HashMap<String, String>>,
    short_term: ShortTermMemory,
    long_term: LongTermMemory,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn CompletionProvider>,
    options: AgentOptions,
}

impl std::fmt::Debug for ConversationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationAgent")
            .field("name", &self.name())
            .field("short_term", &self.short_term.len())
            .field("long_term", &self.long_term.len())
            .field("options", &self.options)
            .finish()
    }
}

impl ConversationAgent {
    /// Create an agent with empty memories.
    ///
    /// # Errors
    ///
    /// Fails if the embedder's dimension differs from
    /// `options.embedding_dim`; every insert would be rejected otherwise.
    pub fn new(
        personality: Personality,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionProvider>,
        options: AgentOptions,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            embedder.dimension() == options.embedding_dim,
            "embedder produces {}-d vectors but memory expects {}-d",
            embedder.dimension(),
            options.embedding_dim
        );

        Ok(Self {
            original_personality: personality.clone(),
            personality: RwLock::new(personality),
            current_context: Mutex::new(HashMap::new()),
            short_term: ShortTermMemory::new(options.short_term_capacity),
            long_term: LongTermMemory::new(options.embedding_dim),
            embedder,
            completer,
            options,
        })
    }

    /// Current display name.
    #[must_use]
    pub fn name(&self) -> String {
        self.personality().name
    }

    /// Snapshot of the current personality.
    #[must_use]
    pub fn personality(&self) -> Personality {
        self.personality
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current backstory.
    #[must_use]
    pub fn backstory(&self) -> String {
        self.personality().backstory().to_string()
    }

    /// Short-term store.
    #[must_use]
    pub fn short_term_memory(&self) -> &ShortTermMemory {
        &self.short_term
    }

    /// Long-term store.
    #[must_use]
    pub fn long_term_memory(&self) -> &LongTermMemory {
        &self.long_term
    }

    /// Merge new traits into the personality.
    pub fn update_personality(&self, traits: &HashMap<String, String>) {
        let mut personality = self
            .personality
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ignored = personality.apply(traits);
        if !ignored.is_empty() {
            tracing::warn!(agent = %personality.name, ?ignored, "Ignored unknown personality traits");
        }
    }

    /// Restore the personality the agent was created with.
    pub fn revert_personality(&self) {
        *self
            .personality
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.original_personality.clone();
    }

    /// Answer `message`, remembering both the message and the answer.
    ///
    /// `context` is merged into the agent's running context, and a copy of
    /// the merged context is attached to both memories.
    ///
    /// # Errors
    ///
    /// Embedding failures and memory dimension errors propagate. A failed
    /// completion call does not: the agent answers with an apology instead.
    #[instrument(skip_all, fields(agent = %self.name()))]
    pub async fn process_message(
        &self,
        message: &str,
        context: HashMap<String, String>,
    ) -> anyhow::Result<String> {
        let context = {
            let mut current = self
                .current_context
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            current.extend(context);
            current.clone()
        };

        let message_embedding = self
            .embedder
            .embed(message)
            .await
            .context("failed to embed incoming message")?;
        self.remember(message, message_embedding.clone(), &context)?;

        let recent = self
            .short_term
            .get_recent_memories(Some(self.options.recent_window));
        let relevant = self
            .long_term
            .search_memories(&message_embedding, self.options.relevant_k)?;

        let response = self.generate_response(message, &recent, &relevant).await;

        let response_embedding = self
            .embedder
            .embed(&response)
            .await
            .context("failed to embed response")?;
        self.remember(&response, response_embedding, &context)?;

        Ok(response)
    }

    /// Recent turns, newest first, with local wall-clock times.
    #[must_use]
    pub fn conversation_summary(&self) -> String {
        let mut summary = String::from("Conversation summary:\n");
        for memory in self.short_term.get_recent_memories(None) {
            let _ = writeln!(
                summary,
                "[{}] {}",
                memory.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                memory.content
            );
        }
        summary
    }

    fn remember(
        &self,
        content: &str,
        embedding: Vec<f32>,
        context: &HashMap<String, String>,
    ) -> anyhow::Result<()> {
        self.short_term
            .add_memory(content, TURN_IMPORTANCE, context.clone());
        self.long_term
            .add_memory(content, embedding, TURN_IMPORTANCE, context.clone())?;
        Ok(())
    }

    async fn generate_response(
        &self,
        message: &str,
        recent: &[Memory],
        relevant: &[(Memory, f32)],
    ) -> String {
        let conversation_move = self.options.moves.as_ref().and_then(|catalog| {
            let mv = catalog.choose()?;
            tracing::debug!(conversation_move = %mv, "Selected conversation move");
            catalog.format_for_prompt(mv, None)
        });

        let system = prompt::build_system_prompt(
            &self.personality(),
            recent,
            relevant,
            conversation_move.as_deref(),
        );

        match self
            .completer
            .complete(vec![Message::system(system), Message::user(message)])
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = ?e, "Completion failed, answering with fallback");
                fallback_response(&e)
            }
        }
    }
}

/// Reply used when the completion provider fails.
fn fallback_response(err: &anyhow::Error) -> String {
    format!(
        "I apologize, but I encountered an error while processing your message: {err}. \
         Please try again or contact support if the issue persists."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Bag-of-letters embedding: deterministic and good enough to rank.
    #[derive(Debug)]
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                v[usize::from(c - b'a')] += 1.0;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            26
        }
    }

    /// Echoes the system prompt back so tests can inspect it.
    #[derive(Debug)]
    struct PromptEcho;

    #[async_trait]
    impl CompletionProvider for PromptEcho {
        async fn complete(&self, messages: Vec<Message>) -> anyhow::Result<String> {
            Ok(messages[0].content.clone())
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl CompletionProvider for Broken {
        async fn complete(&self, _messages: Vec<Message>) -> anyhow::Result<String> {
            anyhow::bail!("upstream 503")
        }
    }

    fn options() -> AgentOptions {
        AgentOptions {
            embedding_dim: 26,
            ..AgentOptions::default()
        }
    }

    fn agent(completer: Arc<dyn CompletionProvider>) -> ConversationAgent {
        ConversationAgent::new(
            Personality::default(),
            Arc::new(LetterEmbedder),
            completer,
            options(),
        )
        .unwrap()
    }

    #[test]
    fn test_dimension_must_match_embedder() {
        let err = ConversationAgent::new(
            Personality::default(),
            Arc::new(LetterEmbedder),
            Arc::new(PromptEcho),
            AgentOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("26-d"));
    }

    #[tokio::test]
    async fn test_process_message_records_both_turns() {
        let agent = agent(Arc::new(PromptEcho));
        let context = HashMap::from([("speaker".to_string(), "Bob".to_string())]);

        let reply = agent.process_message("hello there", context).await.unwrap();

        assert!(reply.contains("- hello there"));
        assert_eq!(agent.short_term_memory().len(), 2);
        assert_eq!(agent.long_term_memory().len(), 2);

        let all = agent.long_term_memory().get_all_memories();
        assert_eq!(all[0].content, "hello there");
        assert_eq!(all[1].content, reply);
        assert_eq!(all[1].context["speaker"], "Bob");
    }

    #[tokio::test]
    async fn test_context_accumulates() {
        let agent = agent(Arc::new(PromptEcho));
        agent
            .process_message("one", HashMap::from([("turn".to_string(), "0".to_string())]))
            .await
            .unwrap();
        agent
            .process_message("two", HashMap::from([("speaker".to_string(), "Bob".to_string())]))
            .await
            .unwrap();

        let latest = agent.short_term_memory().get_recent_memories(Some(1));
        assert_eq!(latest[0].context["turn"], "0");
        assert_eq!(latest[0].context["speaker"], "Bob");
    }

    #[tokio::test]
    async fn test_completion_failure_falls_back() {
        let agent = agent(Arc::new(Broken));
        let reply = agent.process_message("hi", HashMap::new()).await.unwrap();

        assert!(reply.starts_with("I apologize"));
        assert!(reply.contains("upstream 503"));
        assert_eq!(agent.long_term_memory().len(), 2);
    }

    #[tokio::test]
    async fn test_moves_reach_the_prompt() {
        let agent = ConversationAgent::new(
            Personality::default(),
            Arc::new(LetterEmbedder),
            Arc::new(PromptEcho),
            AgentOptions {
                moves: Some(Arc::new(MoveCatalog::standard())),
                ..options()
            },
        )
        .unwrap();

        let reply = agent.process_message("hi", HashMap::new()).await.unwrap();
        assert!(reply.contains("MOVE: "));
    }

    #[test]
    fn test_personality_update_and_revert() {
        let agent = agent(Arc::new(PromptEcho));
        agent.update_personality(&HashMap::from([
            ("name".to_string(), "Zed".to_string()),
            ("backstory".to_string(), "Grew up at sea.".to_string()),
        ]));
        assert_eq!(agent.name(), "Zed");
        assert_eq!(agent.backstory(), "Grew up at sea.");

        agent.revert_personality();
        assert_eq!(agent.name(), "AI Assistant");
    }

    #[tokio::test]
    async fn test_conversation_summary() {
        let agent = agent(Arc::new(PromptEcho));
        agent.process_message("hi", HashMap::new()).await.unwrap();

        let summary = agent.conversation_summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Conversation summary:");
        assert!(lines[1].starts_with('['));
        // Newest first: the reply comes before the message.
        assert!(summary.rfind("] hi").unwrap() > summary.find("] You are").unwrap());
    }
}
