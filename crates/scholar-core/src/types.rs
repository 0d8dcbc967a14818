use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The signed-in user.
    User,
    /// The topic assistant (answers, greetings and error notices).
    Assistant,
    /// Out-of-band notices from the application itself.
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A single entry in the chat log. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// The fixed document a session answers from.
///
/// Built once per session after sign-in and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeContext {
    /// Label used in prompts and greetings, e.g. "University of Jhang".
    pub topic_name: String,
    /// Display name of the document the content came from.
    pub source_label: String,
    /// Full knowledge text.
    pub content: String,
}

impl KnowledgeContext {
    pub fn new(
        topic_name: impl Into<String>,
        source_label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            topic_name: topic_name.into(),
            source_label: source_label.into(),
            content: content.into(),
        }
    }
}

// =============================================================================
// Session state
// =============================================================================

/// Everything a front-end needs to render a chat session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Append-only message log. Only a full reset clears it.
    pub messages: Vec<Message>,
    /// True while exactly one answering request is outstanding.
    pub pending: bool,
    /// Reason of the most recent failed answer, cleared by the next submission.
    pub last_error: Option<String>,
}

impl SessionState {
    /// Append a message, keeping timestamps non-decreasing within the log.
    pub fn push(&mut self, mut message: Message) {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message and clear the request flags.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = false;
        self.last_error = None;
    }
}
