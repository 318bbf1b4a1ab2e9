//! Agent and topic catalogs.
//!
//! Loaded from two YAML files:
//!
//! ```yaml
//! # agents.yaml
//! agents:
//!   alice:
//!     name: Alice
//!     tone: friendly and curious
//!     interests: tech startups, sci-fi movies, and future trends
//!     communication_style: casual and enthusiastic
//!
//! # topics.yaml
//! topics:
//!   - What's your take on AI and creativity?
//! ```
//!
//! Agent order follows the file, so "the first two agents" is stable.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::agent::Personality;

/// Selectable agents and conversation openers.
#[derive(Debug, Clone)]
pub struct Catalog {
    agents: Vec<(String, Personality)>,
    topics: Vec<String>,
}

#[derive(Deserialize)]
struct AgentsFile {
    agents: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct TopicsFile {
    topics: Vec<String>,
}

impl Catalog {
    #[must_use]
    pub fn new(agents: Vec<(String, Personality)>, topics: Vec<String>) -> Self {
        Self { agents, topics }
    }

    /// Load both files, falling back to [`Catalog::fallback`] if either fails.
    #[must_use]
    pub fn load_or_fallback(agents_file: &Path, topics_file: &Path) -> Self {
        match Self::load(agents_file, topics_file) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = ?e, "Error loading configurations, using defaults");
                Self::fallback()
            }
        }
    }

    /// Load both catalog files.
    pub fn load(agents_file: &Path, topics_file: &Path) -> Result<Self> {
        let agents = std::fs::read_to_string(agents_file)
            .with_context(|| format!("Configuration file not found: {}", agents_file.display()))?;
        let topics = std::fs::read_to_string(topics_file)
            .with_context(|| format!("Configuration file not found: {}", topics_file.display()))?;
        Self::from_yaml(&agents, &topics)
    }

    /// Parse catalogs from YAML text.
    pub fn from_yaml(agents_yaml: &str, topics_yaml: &str) -> Result<Self> {
        let agents_file: AgentsFile =
            serde_yaml::from_str(agents_yaml).context("invalid agents catalog")?;
        let topics_file: TopicsFile =
            serde_yaml::from_str(topics_yaml).context("invalid topics catalog")?;

        let mut agents = Vec::with_capacity(agents_file.agents.len());
        for (key, value) in agents_file.agents {
            let id = key
                .as_str()
                .context("agent ids must be strings")?
                .to_string();
            let personality: Personality = serde_yaml::from_value(value)
                .with_context(|| format!("invalid personality for agent `{id}`"))?;
            agents.push((id, personality));
        }

        Ok(Self::new(agents, topics_file.topics))
    }

    /// Built-in catalog used when configuration is missing.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(
            vec![(
                "alice".to_string(),
                Personality {
                    name: "Alice".to_string(),
                    tone: "friendly and curious".to_string(),
                    interests: "tech startups, sci-fi movies, and future trends".to_string(),
                    communication_style: "casual and enthusiastic".to_string(),
                    backstory: None,
                },
            )],
            vec![
                "What's your take on AI and creativity?".to_string(),
                "How do you like to spend your free time?".to_string(),
            ],
        )
    }

    /// Agents in file order.
    #[must_use]
    pub fn agents(&self) -> &[(String, Personality)] {
        &self.agents
    }

    /// Conversation openers.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Personality for an agent id.
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<&Personality> {
        self.agents
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, personality)| personality)
    }

    /// Ids preselected in the UI: the first two agents, or the first one
    /// twice when only one is configured.
    #[must_use]
    pub fn default_pair(&self) -> Option<(&str, &str)> {
        let first = self.agents.first()?.0.as_str();
        let second = self.agents.get(1).map_or(first, |(id, _)| id.as_str());
        Some((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENTS: &str = r"
agents:
  zoe:
    name: Zoe
    tone: wry
    interests: astronomy
    communication_style: playful
    backstory: Former lighthouse keeper.
  adam:
    name: Adam
    tone: earnest
    interests: woodworking
    communication_style: slow and thoughtful
";

    const TOPICS: &str = r"
topics:
  - Is craftsmanship dying?
  - What do the stars owe us?
";

    #[test]
    fn test_from_yaml_keeps_file_order() {
        let catalog = Catalog::from_yaml(AGENTS, TOPICS).unwrap();
        let ids: Vec<&str> = catalog.agents().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["zoe", "adam"]);
        assert_eq!(catalog.default_pair(), Some(("zoe", "adam")));
        assert_eq!(catalog.topics().len(), 2);
        assert_eq!(
            catalog.agent("zoe").unwrap().backstory(),
            "Former lighthouse keeper."
        );
        assert!(catalog.agent("nobody").is_none());
    }

    #[test]
    fn test_invalid_personality_is_reported() {
        let err = Catalog::from_yaml("agents:\n  bad:\n    name: Bad\n", TOPICS).unwrap_err();
        assert!(format!("{err:#}").contains("agent `bad`"));
    }

    #[test]
    fn test_missing_files_fall_back() {
        let catalog = Catalog::load_or_fallback(
            Path::new("/nonexistent/agents.yaml"),
            Path::new("/nonexistent/topics.yaml"),
        );
        assert_eq!(catalog.default_pair(), Some(("alice", "alice")));
        assert_eq!(catalog.topics().len(), 2);
    }
}
