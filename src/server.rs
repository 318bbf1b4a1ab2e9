use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message as WsMessage, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::agent::Personality;
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::embedding::{Embedder, FastEmbedder};
use crate::llm::{CompletionProvider, LlmSettings, chat_completions::ChatCompletionsDriver};
use crate::moves::MoveCatalog;
use crate::simulation::{
    ConversationLogger, Simulation, SimulationEvent, SimulationRegistry, SimulationSettings,
};

/// Outbound frames buffered per connection.
const OUTBOUND_BUFFER: usize = 64;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let embedder = Arc::new(FastEmbedder::new());
    if let Err(e) = embedder.initialize().await {
        tracing::error!("Failed to initialize embedding model: {:?}", e);
    }

    let catalog = Catalog::load_or_fallback(&config.paths.agents_file, &config.paths.topics_file);
    info!(
        name: "catalog.loaded",
        agents = catalog.agents().len(),
        topics = catalog.topics().len(),
        "Agent catalog loaded"
    );

    let moves = config
        .simulation
        .use_moves
        .then(|| Arc::new(MoveCatalog::standard()));

    let state = AppState {
        config: Arc::clone(&config),
        catalog: Arc::new(catalog),
        embedder: embedder as Arc<dyn Embedder>,
        completer: Arc::new(ChatCompletionsDriver::new(settings)) as Arc<dyn CompletionProvider>,
        moves,
        simulations: SimulationRegistry::new(),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/agents", get(api_agents))
        .route("/api/topics", get(api_topics))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Catalog entry returned by `GET /api/agents`.
#[derive(Debug, Serialize)]
struct AgentEntry<'a> {
    id: &'a str,
    #[serde(flatten)]
    personality: &'a Personality,
}

/// GET /api/agents - Selectable agents in catalog order.
async fn api_agents(State(state): State<AppState>) -> Response {
    let agents: Vec<AgentEntry<'_>> = state
        .catalog
        .agents()
        .iter()
        .map(|(id, personality)| AgentEntry { id, personality })
        .collect();
    Json(agents).into_response()
}

/// GET /api/topics - Conversation openers.
async fn api_topics(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.catalog.topics().to_vec())
}

/// GET / - Simulation page.
async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.catalog))
}

fn render_index(catalog: &Catalog) -> String {
    let (first, second) = catalog.default_pair().unwrap_or_default();

    let agent_options = |selected: &str| {
        let mut html = String::new();
        for (id, personality) in catalog.agents() {
            let _ = writeln!(
                html,
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(id),
                if id == selected { " selected" } else { "" },
                escape_html(&personality.name)
            );
        }
        html
    };

    let mut topic_options = String::new();
    for topic in catalog.topics() {
        let topic = escape_html(topic);
        let _ = writeln!(topic_options, r#"<option value="{topic}">{topic}</option>"#);
    }

    INDEX_TEMPLATE
        .replace("{{agent1_options}}", &agent_options(first))
        .replace("{{agent2_options}}", &agent_options(second))
        .replace("{{topic_options}}", &topic_options)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Persona Duet</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; }
  #log div { margin: .5rem 0; }
  .thinking { color: #888; font-style: italic; }
  .topic { font-weight: bold; }
  .error { color: #b00; }
  pre { white-space: pre-wrap; background: #f4f4f4; padding: .5rem; }
</style>
</head>
<body>
<h1>Persona Duet</h1>
<form id="controls">
  <select id="agent1">
{{agent1_options}}  </select>
  <select id="agent2">
{{agent2_options}}  </select>
  <select id="topic">
{{topic_options}}  </select>
  <button type="submit" id="start">Start</button>
  <button type="button" id="stop">Stop</button>
</form>
<div id="log"></div>
<script>
  const log = document.getElementById("log");
  const proto = location.protocol === "https:" ? "wss" : "ws";
  const socket = new WebSocket(`${proto}://${location.host}/ws`);

  function line(cls, text) {
    const div = document.createElement("div");
    div.className = cls;
    div.textContent = text;
    log.appendChild(div);
    div.scrollIntoView();
  }

  socket.addEventListener("message", (e) => {
    const frame = JSON.parse(e.data);
    if (frame.event === "error") {
      line("error", frame.data.message);
      return;
    }
    const msg = frame.data;
    log.querySelectorAll(".thinking").forEach((n) => n.remove());
    switch (msg.type) {
      case "topic": line("topic", `Topic: ${msg.content}`); break;
      case "thinking": line("thinking", `${msg.agent} is thinking...`); break;
      case "response": line("response", `${msg.agent}: ${msg.content}`); break;
      case "error": line("error", msg.message); break;
      case "summary":
        for (const key of ["agent1", "agent2"]) {
          const pre = document.createElement("pre");
          pre.textContent = msg.content[key];
          log.appendChild(pre);
        }
        break;
    }
  });

  document.getElementById("controls").addEventListener("submit", (e) => {
    e.preventDefault();
    log.replaceChildren();
    socket.send(JSON.stringify({
      event: "start_simulation",
      data: {
        agent1: document.getElementById("agent1").value,
        agent2: document.getElementById("agent2").value,
        topic: document.getElementById("topic").value,
      },
    }));
  });

  document.getElementById("stop").addEventListener("click", () => {
    socket.send(JSON.stringify({ event: "stop_simulation" }));
  });
</script>
</body>
</html>
"#;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// Frame received from the browser.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Option<StartRequest>,
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    agent1: Option<String>,
    agent2: Option<String>,
    topic: Option<String>,
}

/// Frame sent to the browser.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    SimulationMessage(SimulationEvent),
    Error { message: String },
}

impl ServerFrame {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// GET /ws - Simulation control channel.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(name: "ws.connected", connection_id = %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize frame");
                    continue;
                }
            };
            if sender
                .send(WsMessage::Text(Utf8Bytes::from(text)))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                handle_client_frame(&state, &connection_id, &text, &out_tx).await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "WebSocket receive failed");
                break;
            }
        }
    }

    if let Some(simulation) = state.simulations.remove(&connection_id) {
        simulation.cancel();
    }
    send_task.abort();
    info!(name: "ws.disconnected", connection_id = %connection_id, "WebSocket disconnected");
}

async fn handle_client_frame(
    state: &AppState,
    connection_id: &str,
    text: &str,
    out: &mpsc::Sender<ServerFrame>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(connection_id, error = %e, "Dropping malformed frame");
            let _ = out.send(ServerFrame::error("Malformed message")).await;
            return;
        }
    };

    match frame.event.as_str() {
        "start_simulation" => {
            let request = frame.data.unwrap_or_default();
            if let Err(message) = start_simulation(state, connection_id, request, out) {
                let _ = out.send(ServerFrame::error(message)).await;
            }
        }
        "stop_simulation" => {
            // The summary follows on the simulation's own event stream.
            if let Some(simulation) = state.simulations.remove(connection_id)
                && !simulation.stop()
            {
                debug!(connection_id, "Simulation had already finished");
            }
        }
        other => {
            debug!(connection_id, event = other, "Ignoring unknown event");
        }
    }
}

/// Build both agents, register the simulation and spawn its loop.
fn start_simulation(
    state: &AppState,
    connection_id: &str,
    request: StartRequest,
    out: &mpsc::Sender<ServerFrame>,
) -> Result<(), String> {
    let present = |value: Option<String>| value.filter(|s| !s.trim().is_empty());
    let (Some(agent1_id), Some(agent2_id), Some(topic)) = (
        present(request.agent1),
        present(request.agent2),
        present(request.topic),
    ) else {
        return Err("Missing required parameters".to_string());
    };

    let personality1 = lookup(&state.catalog, &agent1_id)?;
    let personality2 = lookup(&state.catalog, &agent2_id)?;

    let agent1 = state.build_agent(personality1).map_err(|e| format!("{e:#}"))?;
    let agent2 = state.build_agent(personality2).map_err(|e| format!("{e:#}"))?;

    let simulation_id = Uuid::new_v4().to_string();
    let logger = match ConversationLogger::new(
        &state.config.paths.logs_dir,
        &simulation_id,
        &agent1.name(),
        &agent2.name(),
        &topic,
    ) {
        Ok(logger) => Some(logger),
        Err(e) => {
            warn!(error = ?e, "Conversation log disabled for this simulation");
            None
        }
    };

    let simulation = Arc::new(Simulation::new(
        simulation_id,
        Arc::new(agent1),
        Arc::new(agent2),
        topic,
        SimulationSettings::from(&state.config.simulation),
        logger,
    ));
    state
        .simulations
        .insert(connection_id, Arc::clone(&simulation));

    let (event_tx, mut event_rx) = mpsc::channel::<SimulationEvent>(OUTBOUND_BUFFER);
    let out = out.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if out.send(ServerFrame::SimulationMessage(event)).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(simulation.run(event_tx));

    Ok(())
}

fn lookup(catalog: &Catalog, id: &str) -> Result<Personality, String> {
    catalog
        .agent(id)
        .cloned()
        .ok_or_else(|| format!("Unknown agent: {id}"))
}
