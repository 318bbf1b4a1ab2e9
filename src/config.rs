//! Application configuration.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. a YAML file (`--config` / `CONFIG_FILE`, else `./config.yaml` if present),
//! 3. `DUET_`-prefixed environment variables (`DUET_SERVER__PORT=8000`),
//! 4. command-line flags.
//!
//! LLM connection settings come from their own environment variables via
//! [`load_llm_settings`].

use std::env;
use std::path::{Path, PathBuf};

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::llm::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, LlmSettings, Provider,
    provider::DEFAULT_AZURE_API_VERSION,
};

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub memory: MemoryConfig,
    pub simulation: SimulationConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Short-term buffer capacity per agent.
    pub short_term_capacity: usize,
    /// Long-term embedding dimension; must match the embedding model.
    pub embedding_dim: usize,
    /// Recent turns fed into each prompt.
    pub recent_window: usize,
    /// Relevant past turns fed into each prompt.
    pub relevant_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Pause after each agent reply.
    pub turn_delay_ms: u64,
    /// Stop after this many full turns; 0 runs until stopped.
    pub max_turns: u64,
    /// Nudge agents with a random conversation move each reply.
    pub use_moves: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub agents_file: PathBuf,
    pub topics_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 5000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("memory.short_term_capacity", 10)?
            .set_default("memory.embedding_dim", 768)?
            .set_default("memory.recent_window", 5)?
            .set_default("memory.relevant_k", 3)?
            .set_default("simulation.turn_delay_ms", 2000)?
            .set_default("simulation.max_turns", 0)?
            .set_default("simulation.use_moves", false)?
            .set_default("paths.agents_file", "config/agents.yaml")?
            .set_default("paths.topics_file", "config/topics.yaml")?
            .set_default("paths.logs_dir", "logs")?;

        match &cli.config {
            Some(path) => {
                builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
            }
            None if Path::new(CWD_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::new(CWD_CONFIG_FILE, FileFormat::Yaml));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("DUET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their plain env fallbacks via clap) win.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }

        builder.build()?.try_deserialize()
    }
}

pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url = env::var("LLM_BASE_URL")
        .unwrap_or_else(|_| "https://api.openai.com".to_string());
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = env::var("LLM_API_KEY")
        .or_else(|_| env::var("OPENAI_API_KEY"))
        .ok()
        .filter(|s| !s.trim().is_empty());

    let temperature = match env::var("LLM_TEMPERATURE") {
        Ok(raw) => raw
            .parse::<f32>()
            .map_err(|_| format!("LLM_TEMPERATURE is not a number: {raw}"))?,
        Err(_) => DEFAULT_TEMPERATURE,
    };
    let max_tokens = match env::var("LLM_MAX_TOKENS") {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|_| format!("LLM_MAX_TOKENS is not a positive integer: {raw}"))?,
        Err(_) => DEFAULT_MAX_TOKENS,
    };

    let mut provider = Provider::detect_from_url(&base_url);
    if let Provider::AzureOpenAI { .. } = &provider {
        let deployment_name = env::var("AZURE_DEPLOYMENT_NAME")
            .map_err(|_| "Azure endpoints need AZURE_DEPLOYMENT_NAME".to_string())?;
        provider = Provider::AzureOpenAI {
            deployment_name,
            api_version: env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string()),
        };
    }

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        temperature,
        max_tokens,
    })
}
