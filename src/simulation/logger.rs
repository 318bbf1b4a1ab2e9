//! Per-session JSON transcript.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub agent: Option<String>,
    pub content: Option<String>,
}

/// Everything written to a session log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
    pub session_id: String,
    pub start_time: String,
    pub agent1: String,
    pub agent2: String,
    pub topic: String,
    pub messages: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<BTreeMap<String, String>>,
}

/// Writes a pretty-printed JSON transcript, rewriting the file after every
/// change so a crash loses at most the entry in flight.
#[derive(Debug)]
pub struct ConversationLogger {
    path: PathBuf,
    log: ConversationLog,
}

impl ConversationLogger {
    /// Create `logs_dir` if needed and write the initial log file.
    pub fn new(
        logs_dir: &Path,
        session_id: &str,
        agent1: &str,
        agent2: &str,
        topic: &str,
    ) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("failed to create log dir {}", logs_dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = logs_dir.join(format!("conversation_{stamp}_{session_id}.json"));

        let logger = Self {
            path,
            log: ConversationLog {
                session_id: session_id.to_string(),
                start_time: now(),
                agent1: agent1.to_string(),
                agent2: agent2.to_string(),
                topic: topic.to_string(),
                messages: Vec::new(),
                end_time: None,
                summaries: None,
            },
        };
        logger.save()?;
        Ok(logger)
    }

    /// Where the transcript is written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current transcript contents.
    #[must_use]
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Append an entry and flush.
    pub fn log_message(
        &mut self,
        kind: &str,
        agent: Option<&str>,
        content: Option<&str>,
    ) -> Result<()> {
        self.log.messages.push(LogEntry {
            timestamp: now(),
            kind: kind.to_string(),
            agent: agent.map(ToString::to_string),
            content: content.map(ToString::to_string),
        });
        self.save()
    }

    /// Record both agents' summaries and the end time, then flush.
    pub fn log_summary(&mut self, agent1_summary: &str, agent2_summary: &str) -> Result<()> {
        let mut summaries = BTreeMap::new();
        summaries.insert(self.log.agent1.clone(), agent1_summary.to_string());
        summaries.insert(self.log.agent2.clone(), agent2_summary.to_string());

        self.log.end_time = Some(now());
        self.log.summaries = Some(summaries);
        self.save()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.log)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
