//! Loading the fixed knowledge document a session answers from.

use std::path::Path;

use tracing::info;

use crate::config::{expand_home, KnowledgeConfig};
use crate::error::{Result, ScholarError};
use crate::types::KnowledgeContext;

impl KnowledgeContext {
    /// Build a context from the configured document.
    ///
    /// The text is used as-is. A missing, unreadable or blank document is an error.
    pub fn load(config: &KnowledgeConfig) -> Result<Self> {
        let path = expand_home(&config.path);
        Self::from_file(&path, &config.topic_name, &config.source_label)
    }

    pub fn from_file(path: &Path, topic_name: &str, source_label: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScholarError::Knowledge(format!("cannot read {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Err(ScholarError::Knowledge(format!(
                "{} is empty",
                path.display()
            )));
        }
        if topic_name.trim().is_empty() {
            return Err(ScholarError::Knowledge(
                "topic name must not be empty".to_string(),
            ));
        }

        info!(
            path = %path.display(),
            topic = %topic_name,
            bytes = content.len(),
            "Knowledge document loaded"
        );
        Ok(Self::new(topic_name, source_label, content))
    }
}
