//! CLI argument definitions for the Scholar application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use scholar_core::config::ScholarConfig;

/// Scholar: ask questions about one document, answered only from that document.
#[derive(Parser, Debug)]
#[command(name = "scholar", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Knowledge document to answer from (overrides [knowledge].path).
    #[arg(short = 'k', long = "knowledge")]
    pub knowledge: Option<PathBuf>,

    /// Topic name used in the greeting and prompts.
    #[arg(short = 't', long = "topic")]
    pub topic: Option<String>,

    /// Model name (overrides [answering].model).
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Identity token to sign in with.
    #[arg(long = "id-token")]
    pub id_token: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SCHOLAR_CONFIG env var > ~/.scholar/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SCHOLAR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the identity token.
    ///
    /// Priority: --id-token flag > SCHOLAR_ID_TOKEN env var.
    pub fn resolve_id_token(&self) -> Option<String> {
        self.id_token
            .clone()
            .or_else(|| std::env::var("SCHOLAR_ID_TOKEN").ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Load the configuration file and fold the command-line overrides in.
    ///
    /// A missing file yields defaults; a file that fails to parse is an error.
    pub fn load_config(&self) -> scholar_core::Result<ScholarConfig> {
        let mut config = ScholarConfig::load_if_present(&self.resolve_config_path())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Fold command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ScholarConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref path) = self.knowledge {
            config.knowledge.path = path.to_string_lossy().to_string();
        }
        if let Some(ref topic) = self.topic {
            config.knowledge.topic_name = topic.clone();
        }
        if let Some(ref model) = self.model {
            config.answering.model = model.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".scholar").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".scholar").join("config.toml");
    }
    PathBuf::from("config.toml")
}
