//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$EXAMGEN_CONFIG` environment variable
//! 2. `~/.config/examgen/config.toml`
//! 3. Built-in defaults (everything is optional)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
}

/// Database storage settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Default: platform-specific data dir.
    pub path: Option<String>,
}

/// Generation model settings. The API key is never read from the
/// config file, only from `OPENAI_API_KEY`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,
    pub name: String,
    pub temperature: f32,
}

/// Corpus retrieval settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks fetched per generation call.
    pub top_k: usize,
    /// Prompt context budget in chars.
    pub max_context_chars: usize,
}

// --- Defaults ---

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            name: "gpt-4o-mini".into(),
            temperature: 0.4,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            max_context_chars: 12_000,
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    if let Some(p) = &path {
        if p.exists() {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("EXAMGEN_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Some(home) = dirs_home() {
        return Some(home.join(".config").join("examgen").join("config.toml"));
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
