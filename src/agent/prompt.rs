//! System prompt construction.

use std::fmt::Write as _;

use super::personality::Personality;
use crate::memory::Memory;

const GUIDELINES: &str = "CONVERSATION GUIDELINES:
1. Let your backstory and memories deeply influence your responses:
   - Draw from your specific life experiences
   - Reference events from your past when relevant
   - Express views shaped by your unique journey

2. Maintain authentic character voice:
   - Use language and expressions that reflect your background
   - Sound like a person from your field
   - Let your past experiences color your perspective
   - Stay true to your communication style

3. Keep responses natural and concise:
   - Use 1-3 sentences per response
   - Speak conversationally, as if chatting with a friend
   - Stay focused on the current topic
   - Build on the previous message naturally";

/// Render the system prompt for one reply.
///
/// `relevant` pairs come straight from long-term search, so the score is a
/// squared distance (lower is closer).
#[must_use]
pub fn build_system_prompt(
    personality: &Personality,
    recent: &[Memory],
    relevant: &[(Memory, f32)],
    conversation_move: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(2048);

    let _ = writeln!(
        prompt,
        "You are {}, an AI agent having a conversation. Your core traits and background:\n",
        personality.name
    );
    let _ = writeln!(prompt, "BACKSTORY:\n{}\n", personality.backstory());
    let _ = writeln!(
        prompt,
        "PERSONALITY:\n- Tone: {}\n- Interests: {}\n- Communication style: {}\n",
        personality.tone, personality.interests, personality.communication_style
    );
    prompt.push_str(GUIDELINES);
    prompt.push_str("\n\n");

    prompt.push_str("Recent conversation context:\n");
    prompt.push_str(&recent_context(recent));
    prompt.push_str("\n\n");

    prompt.push_str("Relevant past context:\n");
    prompt.push_str(&relevant_context(relevant));
    prompt.push_str("\n\n");

    if let Some(mv) = conversation_move {
        prompt.push_str("For this reply, use the following conversation move:\n");
        prompt.push_str(mv);
        prompt.push('\n');
    }

    prompt.push_str(
        "Remember to maintain your unique voice while keeping responses brief and engaging.",
    );
    prompt
}

fn recent_context(recent: &[Memory]) -> String {
    recent
        .iter()
        .map(|m| format!("- {}", m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn relevant_context(relevant: &[(Memory, f32)]) -> String {
    relevant
        .iter()
        .map(|(m, score)| format!("- {} (relevance: {score:.2})", m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
