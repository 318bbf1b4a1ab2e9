#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use persona_duet::AppState;
use persona_duet::agent::Personality;
use persona_duet::catalog::Catalog;
use persona_duet::config::{AppConfig, MemoryConfig, PathsConfig, ServerConfig, SimulationConfig};
use persona_duet::embedding::Embedder;
use persona_duet::llm::{CompletionProvider, Message};
use persona_duet::simulation::SimulationRegistry;

pub const DIM: usize = 26;

/// Bag-of-letters embedding.
#[derive(Debug)]
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0; DIM];
        for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            v[usize::from(c - b'a')] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Replies "<n>: <incoming message>" with a running counter.
#[derive(Debug, Default)]
pub struct Counter {
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl CompletionProvider for Counter {
    async fn complete(&self, messages: Vec<Message>) -> anyhow::Result<String> {
        let n = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(format!("{n}: {}", messages[1].content))
    }
}

/// Always fails.
#[derive(Debug)]
pub struct Offline;

#[async_trait]
impl CompletionProvider for Offline {
    async fn complete(&self, _messages: Vec<Message>) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

pub fn catalog() -> Catalog {
    let personality = |name: &str, tone: &str| Personality {
        name: name.to_string(),
        tone: tone.to_string(),
        interests: "chess".to_string(),
        communication_style: "brief".to_string(),
        backstory: None,
    };
    Catalog::new(
        vec![
            ("ada".to_string(), personality("Ada", "precise")),
            ("ben".to_string(), personality("Ben", "loose")),
            ("cy".to_string(), personality("Cy", "<bold>")),
        ],
        vec!["Openings or endgames?".to_string()],
    )
}

pub fn config(logs_dir: &Path, max_turns: u64) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        memory: MemoryConfig {
            short_term_capacity: 4,
            embedding_dim: DIM,
            recent_window: 3,
            relevant_k: 2,
        },
        simulation: SimulationConfig {
            turn_delay_ms: 2000,
            max_turns,
            use_moves: false,
        },
        paths: PathsConfig {
            agents_file: "config/agents.yaml".into(),
            topics_file: "config/topics.yaml".into(),
            logs_dir: logs_dir.to_path_buf(),
        },
    }
}

pub fn state(logs_dir: &Path, completer: Arc<dyn CompletionProvider>) -> AppState {
    AppState {
        config: Arc::new(config(logs_dir, 2)),
        catalog: Arc::new(catalog()),
        embedder: Arc::new(LetterEmbedder),
        completer,
        moves: None,
        simulations: SimulationRegistry::new(),
    }
}
