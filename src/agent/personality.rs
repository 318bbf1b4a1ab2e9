//! Agent personality traits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Shown when a personality has no backstory.
pub const NO_BACKSTORY: &str = "No detailed backstory available.";

/// Who an agent is: name, voice and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub name: String,
    pub tone: String,
    pub interests: String,
    pub communication_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            name: "AI Assistant".to_string(),
            tone: "friendly and professional".to_string(),
            interests: "helping users with their tasks".to_string(),
            communication_style: "clear and concise".to_string(),
            backstory: Some(NO_BACKSTORY.to_string()),
        }
    }
}

impl Personality {
    /// Backstory text, or the placeholder when none is set.
    #[must_use]
    pub fn backstory(&self) -> &str {
        self.backstory.as_deref().unwrap_or(NO_BACKSTORY)
    }

    /// Overwrite the traits named in `traits`. Unknown keys are ignored.
    ///
    /// Returns the keys that were not recognised.
    pub fn apply(&mut self, traits: &HashMap<String, String>) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in traits {
            match key.as_str() {
                "name" => self.name.clone_from(value),
                "tone" => self.tone.clone_from(value),
                "interests" => self.interests.clone_from(value),
                "communication_style" => self.communication_style.clone_from(value),
                "backstory" => self.backstory = Some(value.clone()),
                _ => ignored.push(key.clone()),
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_without_backstory() {
        let yaml = r"
name: Bob
tone: dry
interests: trains
communication_style: terse
";
        let personality: Personality = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(personality.name, "Bob");
        assert_eq!(personality.backstory(), NO_BACKSTORY);
    }

    #[test]
    fn test_apply_traits() {
        let mut personality = Personality::default();
        let traits = HashMap::from([
            ("tone".to_string(), "grumpy".to_string()),
            ("mood".to_string(), "sleepy".to_string()),
        ]);
        let ignored = personality.apply(&traits);

        assert_eq!(personality.tone, "grumpy");
        assert_eq!(ignored, ["mood"]);
    }
}
