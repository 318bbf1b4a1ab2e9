mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use persona_duet::agent::{AgentOptions, ConversationAgent};
use persona_duet::embedding::Embedder;
use persona_duet::simulation::logger::ConversationLog;
use persona_duet::simulation::{
    ConversationLogger, Simulation, SimulationEvent, SimulationSettings,
};
use tokio::sync::mpsc;

#[derive(Debug)]
struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("model not loaded")
    }

    fn dimension(&self) -> usize {
        common::DIM
    }
}

fn agents(state: &persona_duet::AppState) -> (Arc<ConversationAgent>, Arc<ConversationAgent>) {
    let ada = state.catalog.agent("ada").unwrap().clone();
    let ben = state.catalog.agent("ben").unwrap().clone();
    (
        Arc::new(state.build_agent(ada).unwrap()),
        Arc::new(state.build_agent(ben).unwrap()),
    )
}

async fn drain(mut rx: mpsc::Receiver<SimulationEvent>) -> Vec<SimulationEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_full_simulation_with_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::state(dir.path(), Arc::new(common::Counter::default()));
    let (ada, ben) = agents(&state);

    let logger =
        ConversationLogger::new(dir.path(), "sim-1", "Ada", "Ben", "Openings or endgames?")
            .unwrap();
    let log_path = logger.path().to_path_buf();

    let sim = Arc::new(Simulation::new(
        "sim-1",
        Arc::clone(&ada),
        Arc::clone(&ben),
        "Openings or endgames?",
        SimulationSettings::from(&state.config.simulation),
        Some(logger),
    ));

    let started = tokio::time::Instant::now();
    let (tx, rx) = mpsc::channel(32);
    Arc::clone(&sim).run(tx).await;
    let events = drain(rx).await;

    // Two full turns, each with two pauses.
    assert_eq!(sim.turn(), 2);
    assert!(started.elapsed() >= Duration::from_millis(4 * 2000));

    let responses: Vec<(String, String)> = events
        .iter()
        .filter_map(|e| match e {
            SimulationEvent::Response { agent, content } => {
                Some((agent.clone(), content.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0], ("Ada".to_string(), "0: Openings or endgames?".to_string()));
    assert_eq!(
        responses[1],
        ("Ben".to_string(), "1: 0: Openings or endgames?".to_string())
    );
    // Turn 2 starts from Ben's reply.
    assert_eq!(responses[2].1, "2: 1: 0: Openings or endgames?");
    assert!(matches!(events.last(), Some(SimulationEvent::Summary { .. })));

    // Capacity 4: each agent saw 2 messages + 2 replies.
    assert_eq!(ada.short_term_memory().len(), 4);
    assert_eq!(ada.long_term_memory().len(), 4);
    let latest = ben.short_term_memory().get_recent_memories(Some(1));
    assert_eq!(latest[0].context["speaker"], "Ada");
    assert_eq!(latest[0].context["turn"], "1");

    let log: ConversationLog =
        serde_json::from_str(&std::fs::read_to_string(log_path).unwrap()).unwrap();
    let kinds: Vec<&str> = log.messages.iter().map(|m| m.kind.as_str()).collect();
    assert_eq!(kinds, ["topic", "response", "response", "response", "response"]);
    assert!(log.end_time.is_some());
    assert!(log.summaries.unwrap()["Ada"].starts_with("Conversation summary:"));
}

#[tokio::test(start_paused = true)]
async fn test_offline_completer_keeps_conversation_going() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::state(dir.path(), Arc::new(common::Offline));
    let (ada, ben) = agents(&state);

    let sim = Arc::new(Simulation::new(
        "sim-2",
        ada,
        ben,
        "Hello",
        SimulationSettings {
            turn_delay: Duration::from_millis(50),
            max_turns: 1,
        },
        None,
    ));
    let (tx, rx) = mpsc::channel(32);
    Arc::clone(&sim).run(tx).await;
    let events = drain(rx).await;

    let apologies = events
        .iter()
        .filter(|e| {
            matches!(e, SimulationEvent::Response { content, .. } if content.starts_with("I apologize"))
        })
        .count();
    assert_eq!(apologies, 2);
    assert!(!events.iter().any(|e| matches!(e, SimulationEvent::Error { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_embedding_failure_ends_with_error_event() {
    let completer = Arc::new(common::Counter::default());
    let agent = |name: &str| {
        let personality = common::catalog().agent(name).unwrap().clone();
        Arc::new(
            ConversationAgent::new(
                personality,
                Arc::new(BrokenEmbedder),
                Arc::clone(&completer) as Arc<dyn persona_duet::llm::CompletionProvider>,
                AgentOptions {
                    embedding_dim: common::DIM,
                    ..AgentOptions::default()
                },
            )
            .unwrap(),
        )
    };

    let sim = Arc::new(Simulation::new(
        "sim-3",
        agent("ada"),
        agent("ben"),
        "Hello",
        SimulationSettings::default(),
        None,
    ));
    let (tx, rx) = mpsc::channel(32);
    Arc::clone(&sim).run(tx).await;
    let events = drain(rx).await;

    assert_eq!(events.len(), 3);
    let SimulationEvent::Error { message } = &events[2] else {
        panic!("expected error event, got {:?}", events[2]);
    };
    assert!(message.contains("model not loaded"));
    assert_eq!(sim.turn(), 0);
}

#[tokio::test]
async fn test_agent_recalls_relevant_memory() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::state(dir.path(), Arc::new(common::Counter::default()));
    let agent = state
        .build_agent(state.catalog.agent("ada").unwrap().clone())
        .unwrap();

    agent
        .process_message("zzzz zzzz", HashMap::new())
        .await
        .unwrap();
    agent
        .process_message("abc", HashMap::new())
        .await
        .unwrap();

    let hits = agent
        .long_term_memory()
        .search_memories(&common::LetterEmbedder.embed("zzzz").await.unwrap(), 1)
        .unwrap();
    assert_eq!(hits[0].0.content, "zzzz zzzz");
}

#[test]
fn test_agent_options_follow_config() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::state(dir.path(), Arc::new(common::Counter::default()));
    let options = state.agent_options();
    assert_eq!(options.short_term_capacity, 4);
    assert_eq!(options.embedding_dim, common::DIM);
    assert_eq!(options.recent_window, 3);
    assert_eq!(options.relevant_k, 2);
    assert!(options.moves.is_none());
}
