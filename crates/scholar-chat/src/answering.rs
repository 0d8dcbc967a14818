//! The answering-service seam.
//!
//! The controller only ever talks to an `AnsweringService`; the Gemini
//! client is one implementation and tests inject stubs.

use async_trait::async_trait;

use crate::error::AnsweringError;

/// Answers a single question from a fixed knowledge text.
///
/// Implementations must not keep conversation state between calls.
#[async_trait]
pub trait AnsweringService: Send + Sync {
    async fn answer(
        &self,
        knowledge: &str,
        topic_name: &str,
        question: &str,
    ) -> Result<String, AnsweringError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "answering-service"
    }
}
