//! Conversation moves.
//!
//! A move is a rhetorical stance (flatter, challenge, ...) an agent can be
//! nudged towards for its next reply. The [`MoveCatalog`] is an ordinary
//! value: build one, share it behind an `Arc`, and hand it to the agents
//! that should use it.

use std::collections::HashMap;
use std::fmt;

use rand::RngExt;
use serde::{Deserialize, Serialize};

/// A rhetorical move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMove {
    Flatter,
    Challenge,
    Defend,
    Defuse,
    Attack,
    Entrust,
}

impl ConversationMove {
    /// Every move, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Flatter,
        Self::Challenge,
        Self::Defend,
        Self::Defuse,
        Self::Attack,
        Self::Entrust,
    ];

    /// Lowercase identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flatter => "flatter",
            Self::Challenge => "challenge",
            Self::Defend => "defend",
            Self::Defuse => "defuse",
            Self::Attack => "attack",
            Self::Entrust => "entrust",
        }
    }
}

impl fmt::Display for ConversationMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a move is described to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDescription {
    pub description: String,
    pub effect: String,
    pub example: String,
}

impl MoveDescription {
    fn new(description: &str, effect: &str, example: &str) -> Self {
        Self {
            description: description.to_string(),
            effect: effect.to_string(),
            example: example.to_string(),
        }
    }
}

/// The set of moves agents may choose from.
#[derive(Debug, Clone, Default)]
pub struct MoveCatalog {
    // Vec keeps selection order deterministic for a given catalog.
    entries: Vec<(ConversationMove, MoveDescription)>,
}

impl MoveCatalog {
    /// Catalog restricted to the given entries.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (ConversationMove, MoveDescription)>) -> Self {
        let mut by_move: HashMap<ConversationMove, MoveDescription> = HashMap::new();
        let mut order = Vec::new();
        for (mv, desc) in entries {
            if by_move.insert(mv, desc).is_none() {
                order.push(mv);
            }
        }
        let entries = order
            .into_iter()
            .filter_map(|mv| by_move.remove(&mv).map(|desc| (mv, desc)))
            .collect();
        Self { entries }
    }

    /// All six moves with their standard descriptions.
    #[must_use]
    pub fn standard() -> Self {
        use ConversationMove::{Attack, Challenge, Defend, Defuse, Entrust, Flatter};

        Self::new([
            (
                Flatter,
                MoveDescription::new(
                    "Express admiration or praise for the other agent's qualities, achievements, or ideas",
                    "Builds rapport and trust, may make the other agent more receptive",
                    "Your experience in [field] is truly impressive, and your insights about [topic] are fascinating.",
                ),
            ),
            (
                Challenge,
                MoveDescription::new(
                    "Question or probe the other agent's assumptions, beliefs, or statements",
                    "Stimulates deeper discussion and critical thinking",
                    "That's an interesting perspective, but have you considered [alternative viewpoint]?",
                ),
            ),
            (
                Defend,
                MoveDescription::new(
                    "Protect and justify one's position, beliefs, or statements when challenged",
                    "Maintains credibility and conviction in one's stance",
                    "I stand by my view because [reasoning], and my experience has shown that [evidence].",
                ),
            ),
            (
                Defuse,
                MoveDescription::new(
                    "Reduce tension or conflict by finding common ground or redirecting the conversation",
                    "Prevents escalation and maintains productive dialogue",
                    "I see where you're coming from, and perhaps we can find middle ground on [aspect].",
                ),
            ),
            (
                Attack,
                MoveDescription::new(
                    "Directly criticize or oppose the other agent's position, beliefs, or statements",
                    "Creates conflict and forces the other agent to defend or reconsider",
                    "Your argument is flawed because [reason], and here's why that matters...",
                ),
            ),
            (
                Entrust,
                MoveDescription::new(
                    "Share personal or vulnerable information to build trust and deepen connection",
                    "Creates intimacy and encourages reciprocal sharing",
                    "Let me share a personal experience about [topic] that shaped my perspective...",
                ),
            ),
        ])
    }

    /// Number of moves available.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no moves are available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves in this catalog.
    pub fn moves(&self) -> impl Iterator<Item = ConversationMove> + '_ {
        self.entries.iter().map(|(mv, _)| *mv)
    }

    /// Description of `mv`, if it is in the catalog.
    #[must_use]
    pub fn describe(&self, mv: ConversationMove) -> Option<&MoveDescription> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == mv)
            .map(|(_, desc)| desc)
    }

    /// Render a move for inclusion in a prompt.
    ///
    /// Returns `None` if the move is not in the catalog.
    #[must_use]
    pub fn format_for_prompt(&self, mv: ConversationMove, context: Option<&str>) -> Option<String> {
        let desc = self.describe(mv)?;
        let mut formatted = format!(
            "MOVE: {}\nDescription: {}\nEffect: {}\nExample: {}\n",
            mv.as_str().to_uppercase(),
            desc.description,
            desc.effect,
            desc.example
        );
        if let Some(context) = context {
            formatted.push_str("Context: ");
            formatted.push_str(context);
            formatted.push('\n');
        }
        Some(formatted)
    }

    /// Pick a move uniformly at random.
    #[must_use]
    pub fn choose(&self) -> Option<ConversationMove> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.entries.len());
        Some(self.entries[idx].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_has_every_move() {
        let catalog = MoveCatalog::standard();
        assert_eq!(catalog.len(), 6);
        for mv in ConversationMove::ALL {
            assert!(catalog.describe(mv).is_some(), "missing {mv}");
        }
    }

    #[test]
    fn test_format_for_prompt() {
        let catalog = MoveCatalog::standard();
        let text = catalog
            .format_for_prompt(ConversationMove::Defuse, Some("heated debate"))
            .unwrap();
        assert!(text.starts_with("MOVE: DEFUSE\n"));
        assert!(text.contains("Effect: Prevents escalation"));
        assert!(text.ends_with("Context: heated debate\n"));

        let plain = catalog
            .format_for_prompt(ConversationMove::Attack, None)
            .unwrap();
        assert!(!plain.contains("Context:"));
    }

    #[test]
    fn test_choose_stays_in_catalog() {
        let catalog = MoveCatalog::new(
            MoveCatalog::standard()
                .entries
                .into_iter()
                .filter(|(mv, _)| matches!(mv, ConversationMove::Flatter | ConversationMove::Entrust)),
        );
        for _ in 0..50 {
            let mv = catalog.choose().unwrap();
            assert!(matches!(mv, ConversationMove::Flatter | ConversationMove::Entrust));
        }
        assert!(catalog.format_for_prompt(ConversationMove::Attack, None).is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = MoveCatalog::default();
        assert!(catalog.is_empty());
        assert_eq!(catalog.choose(), None);
    }

    #[test]
    fn test_duplicate_entries_keep_last_description() {
        let catalog = MoveCatalog::new([
            (ConversationMove::Defend, MoveDescription::new("a", "b", "c")),
            (ConversationMove::Defend, MoveDescription::new("x", "y", "z")),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.describe(ConversationMove::Defend).unwrap().description, "x");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ConversationMove::Challenge).unwrap();
        assert_eq!(json, "\"challenge\"");
    }
}
