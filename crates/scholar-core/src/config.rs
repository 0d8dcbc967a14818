use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for Scholar.
///
/// Loaded from `~/.scholar/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub answering: AnsweringConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl ScholarConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScholarConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration if the file exists, otherwise use defaults.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_present(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote answering service (Gemini generateContent) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsweringConfig {
    /// API key. Prefer `api_key_env` so the key stays out of the file.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Base URL of the generative language API.
    pub base_url: String,
    /// Model name used for every request.
    pub model: String,
    /// Upper bound on a single answering request.
    pub request_timeout_secs: u64,
}

impl Default for AnsweringConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl AnsweringConfig {
    /// Resolve the API key: explicit config value first, then the configured
    /// environment variable. Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Like `resolve_api_key`, with the environment lookup supplied by the caller.
    pub fn resolve_api_key_with<F>(&self, env: F) -> Option<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let from_config = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if from_config.is_some() {
            return from_config;
        }
        env(&self.api_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Where the knowledge document lives and how it is labelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Topic name used in prompts and the greeting.
    pub topic_name: String,
    /// Display name of the document.
    pub source_label: String,
    /// Path to the plain-text knowledge document. `~/` is expanded.
    pub path: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            topic_name: "University of Jhang".to_string(),
            source_label: "University_of_Jhang_Prospectus_2024.txt".to_string(),
            path: "~/.scholar/knowledge.txt".to_string(),
        }
    }
}

/// Identity token verification settings.
///
/// When `enabled` is false the local OS user is signed in without a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub enabled: bool,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim (the OAuth client ID).
    pub audience: String,
    /// Signature algorithm: "RS256" or "HS256".
    pub algorithm: String,
    /// PEM-encoded RSA public key, required for RS256.
    pub key_path: Option<String>,
    /// Shared secret, required for HS256.
    pub secret: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: "https://accounts.google.com".to_string(),
            audience: String::new(),
            algorithm: "RS256".to_string(),
            key_path: None,
            secret: None,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
