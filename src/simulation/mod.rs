//! Two-agent conversation loop.
//!
//! A [`Simulation`] alternates two [`ConversationAgent`]s: agent 1 answers
//! the current message, agent 2 answers agent 1, and agent 2's reply becomes
//! the next message. Progress is reported as [`SimulationEvent`]s on an
//! `mpsc` channel and mirrored to a [`ConversationLogger`] transcript.
//!
//! Simulations are cancelled through a [`CancellationToken`]; the token is
//! checked before every agent turn and raced against every reply and pause,
//! so a stop takes effect promptly. The closing summary is emitted by the loop
//! itself, at most once, after every other event.

pub mod logger;

pub use logger::ConversationLogger;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::ConversationAgent;
use crate::config::SimulationConfig;

/// Progress reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SimulationEvent {
    /// The opening message.
    Topic { content: String },
    /// An agent started working on a reply.
    Thinking { agent: String },
    /// An agent's reply.
    Response { agent: String, content: String },
    /// Both agents' conversation summaries, sent once the simulation ends.
    Summary { content: SummaryContent },
    /// The simulation stopped because of a failure.
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryContent {
    pub agent1: String,
    pub agent2: String,
}

/// Pacing for a simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    /// Pause after each reply.
    pub turn_delay: Duration,
    /// Stop after this many full turns; 0 runs until stopped.
    pub max_turns: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            turn_delay: Duration::from_secs(2),
            max_turns: 0,
        }
    }
}

impl From<&SimulationConfig> for SimulationSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            turn_delay: Duration::from_millis(config.turn_delay_ms),
            max_turns: config.max_turns,
        }
    }
}

/// One running conversation between two agents.
#[derive(Debug)]
pub struct Simulation {
    id: String,
    agent1: Arc<ConversationAgent>,
    agent2: Arc<ConversationAgent>,
    topic: String,
    settings: SimulationSettings,
    turn: AtomicU64,
    cancel: CancellationToken,
    stop_requested: AtomicBool,
    summarized: AtomicBool,
    logger: Mutex<Option<ConversationLogger>>,
}

impl Simulation {
    /// Create a simulation. Nothing happens until [`Simulation::run`].
    ///
    /// Without a logger the conversation is not persisted.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        agent1: Arc<ConversationAgent>,
        agent2: Arc<ConversationAgent>,
        topic: impl Into<String>,
        settings: SimulationSettings,
        logger: Option<ConversationLogger>,
    ) -> Self {
        Self {
            id: id.into(),
            agent1,
            agent2,
            topic: topic.into(),
            settings,
            turn: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            stop_requested: AtomicBool::new(false),
            summarized: AtomicBool::new(false),
            logger: Mutex::new(logger),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn agents(&self) -> (&Arc<ConversationAgent>, &Arc<ConversationAgent>) {
        (&self.agent1, &self.agent2)
    }

    /// Completed full turns.
    #[must_use]
    pub fn turn(&self) -> u64 {
        self.turn.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Drive the conversation until cancelled, `max_turns` is reached, the
    /// receiver is dropped, or an agent fails.
    ///
    /// Reaching `max_turns` or a [`stop`](Self::stop) ends the stream with a
    /// single [`SimulationEvent::Summary`].
    pub async fn run(self: Arc<Self>, sink: mpsc::Sender<SimulationEvent>) {
        info!(
            name: "simulation.started",
            simulation = %self.id,
            agent1 = %self.agent1.name(),
            agent2 = %self.agent2.name(),
            topic = %self.topic,
            "Simulation started"
        );

        self.log("topic", None, &self.topic);
        let opening = SimulationEvent::Topic {
            content: self.topic.clone(),
        };
        if sink.send(opening).await.is_err() {
            self.cancel.cancel();
            return;
        }

        let mut message = self.topic.clone();
        loop {
            if self.settings.max_turns > 0 && self.turn() >= self.settings.max_turns {
                info!(name: "simulation.completed", simulation = %self.id, turns = self.turn(), "Turn limit reached");
                self.stop_requested.store(true, Ordering::SeqCst);
                self.cancel.cancel();
                break;
            }

            let Some(first) = self
                .take_turn(&self.agent1, &self.agent2, &message, &sink)
                .await
            else {
                break;
            };
            if !self.pause().await {
                break;
            }

            let Some(second) = self
                .take_turn(&self.agent2, &self.agent1, &first, &sink)
                .await
            else {
                break;
            };
            message = second;
            self.turn.fetch_add(1, Ordering::SeqCst);

            if !self.pause().await {
                break;
            }
        }

        self.cancel.cancel();
        if self.stop_requested.load(Ordering::SeqCst)
            && let Some(summary) = self.summarize()
        {
            let _ = sink.send(summary).await;
        }

        info!(name: "simulation.finished", simulation = %self.id, turns = self.turn(), "Simulation loop exited");
    }

    /// Ask the loop to finish with a closing summary.
    ///
    /// Returns `false` if the simulation had already ended, in which case
    /// nothing more is emitted.
    pub fn stop(&self) -> bool {
        let was_active = self.is_active();
        if was_active {
            self.stop_requested.store(true, Ordering::SeqCst);
        }
        self.cancel.cancel();
        was_active
    }

    /// Cancel the loop without a summary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Build the closing summary and write it to the transcript. Only the
    /// first call produces anything.
    fn summarize(&self) -> Option<SimulationEvent> {
        if self.summarized.swap(true, Ordering::SeqCst) {
            return None;
        }

        let content = SummaryContent {
            agent1: self.agent1.conversation_summary(),
            agent2: self.agent2.conversation_summary(),
        };

        if let Some(logger) = self
            .logger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            && let Err(e) = logger.log_summary(&content.agent1, &content.agent2)
        {
            warn!(simulation = %self.id, error = ?e, "Failed to write conversation summary");
        }

        info!(name: "simulation.stopped", simulation = %self.id, turns = self.turn(), "Simulation stopped");
        Some(SimulationEvent::Summary { content })
    }

    /// One agent reply. `None` ends the loop.
    async fn take_turn(
        &self,
        speaker: &ConversationAgent,
        listener: &ConversationAgent,
        message: &str,
        sink: &mpsc::Sender<SimulationEvent>,
    ) -> Option<String> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let agent = speaker.name();
        sink.send(SimulationEvent::Thinking {
            agent: agent.clone(),
        })
        .await
        .ok()?;

        let context = HashMap::from([
            ("speaker".to_string(), listener.name()),
            ("turn".to_string(), self.turn().to_string()),
            ("timestamp".to_string(), Local::now().to_rfc3339()),
        ]);

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => return None,
            outcome = speaker.process_message(message, context) => outcome,
        };
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                let message = format!("{e:#}");
                warn!(simulation = %self.id, agent = %agent, error = %message, "Agent failed");
                self.log("error", Some(&agent), &message);
                let _ = sink.send(SimulationEvent::Error { message }).await;
                return None;
            }
        };

        self.log("response", Some(&agent), &reply);
        sink.send(SimulationEvent::Response {
            agent,
            content: reply.clone(),
        })
        .await
        .ok()?;

        Some(reply)
    }

    /// Sleep for the turn delay. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.settings.turn_delay) => true,
        }
    }

    fn log(&self, kind: &str, agent: Option<&str>, content: &str) {
        if let Some(logger) = self
            .logger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            && let Err(e) = logger.log_message(kind, agent, Some(content))
        {
            warn!(simulation = %self.id, error = ?e, "Failed to write conversation log");
        }
    }
}

/// Running simulations keyed by connection id.
#[derive(Debug, Clone, Default)]
pub struct SimulationRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<Simulation>>>>,
}

impl SimulationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `simulation` under `connection_id`, cancelling whatever ran
    /// there before.
    pub fn insert(&self, connection_id: impl Into<String>, simulation: Arc<Simulation>) {
        let previous = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id.into(), simulation);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<Arc<Simulation>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    /// Remove and return the simulation for `connection_id`.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<Simulation>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
