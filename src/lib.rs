//! Persona Duet
//!
//! Two LLM-backed agents with distinct personalities hold a conversation on a
//! chosen topic, streamed to the browser over a WebSocket.
//!
//! # Architecture
//!
//! - **Memory**: a bounded short-term buffer with importance-aware eviction,
//!   and a long-term store searched by exact L2 nearest neighbour
//! - **Agents**: personality + memories + prompt construction + completion
//! - **Simulation**: the alternating turn loop and its JSON transcript
//! - **Server**: Axum HTTP + WebSocket front end
//!
//! # Modules
//!
//! - [`memory`]: short-term and long-term memory stores
//! - [`agent`]: personality-driven conversation agent
//! - [`embedding`]: text embedding providers
//! - [`llm`]: chat completion driver
//! - [`moves`]: conversation move catalog
//! - [`catalog`]: agent and topic catalogs
//! - [`simulation`]: two-agent loop, registry and transcript logger
//! - [`server`]: HTTP and WebSocket routes

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod agent;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod moves;
pub mod server;
pub mod simulation;
pub mod telemetry;

use std::sync::Arc;

use agent::{AgentOptions, ConversationAgent, Personality};
use catalog::Catalog;
use config::AppConfig;
use embedding::Embedder;
use llm::CompletionProvider;
use moves::MoveCatalog;
use simulation::SimulationRegistry;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
    /// Selectable agents and topics.
    pub catalog: Arc<Catalog>,
    /// Embedding model shared by every agent.
    pub embedder: Arc<dyn Embedder>,
    /// Completion backend shared by every agent.
    pub completer: Arc<dyn CompletionProvider>,
    /// Conversation moves, when enabled.
    pub moves: Option<Arc<MoveCatalog>>,
    /// Running simulations keyed by connection.
    pub simulations: SimulationRegistry,
}

impl AppState {
    /// Agent settings derived from the memory config.
    #[must_use]
    pub fn agent_options(&self) -> AgentOptions {
        let memory = &self.config.memory;
        AgentOptions {
            short_term_capacity: memory.short_term_capacity,
            embedding_dim: memory.embedding_dim,
            recent_window: memory.recent_window,
            relevant_k: memory.relevant_k,
            moves: self.moves.clone(),
        }
    }

    /// Fresh agent with empty memories.
    pub fn build_agent(&self, personality: Personality) -> anyhow::Result<ConversationAgent> {
        ConversationAgent::new(
            personality,
            Arc::clone(&self.embedder),
            Arc::clone(&self.completer),
            self.agent_options(),
        )
    }
}
