//! Knowledge-restricted chat for Scholar.
//!
//! Provides the chat session controller, prompt construction, and the
//! answering-service seam with its Gemini implementation.

pub mod answering;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod prompt;

pub use answering::AnsweringService;
pub use controller::{
    ChatController, IgnoreReason, PendingAnswer, Submission, SubmitOutcome,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{AnsweringError, ChatError};
pub use gemini::GeminiClient;
