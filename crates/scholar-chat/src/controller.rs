//! Chat session controller.
//!
//! Owns the message log and a single-flight request gate. A submission is
//! split in two phases so an event loop can keep handling input (a reset,
//! say) while the answer is in flight:
//!
//! 1. `begin` validates input, appends the user message and marks the
//!    session pending, returning a `PendingAnswer` ticket.
//! 2. `complete` appends the answer or an error reply for that ticket.
//!
//! Each ticket carries the session generation it was issued under. `reset`
//! and `end` advance the generation, so a late answer for an older ticket
//! is dropped instead of landing in a fresh log.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use scholar_core::types::{KnowledgeContext, Message, SessionState};

use crate::answering::AnsweringService;
use crate::error::{AnsweringError, ChatError};
use crate::prompt::{error_reply, greeting};

/// Default upper bound on a single answering call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a submission was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Empty or whitespace-only input.
    EmptyInput,
    /// Another answer is still outstanding.
    Busy,
}

/// Result of the first phase of a submission.
#[derive(Debug, Clone)]
pub enum Submission {
    Ignored(IgnoreReason),
    Started(PendingAnswer),
}

/// Final result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing changed.
    Ignored(IgnoreReason),
    /// The answer was appended.
    Answered(Message),
    /// An error reply was appended and `last_error` set.
    Failed { message: Message, reason: String },
    /// The answer belonged to a session generation that has since been reset.
    Discarded,
}

/// Ticket for one outstanding answering request.
#[derive(Debug, Clone)]
pub struct PendingAnswer {
    generation: u64,
    context: Arc<KnowledgeContext>,
    question: String,
    timeout: Duration,
}

impl PendingAnswer {
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Ask the service, bounded by the controller's request timeout.
    ///
    /// Does not touch the session; feed the result to `ChatController::complete`.
    pub async fn resolve(&self, service: &dyn AnsweringService) -> Result<String, AnsweringError> {
        debug!(
            service = service.name(),
            generation = self.generation,
            question_len = self.question.len(),
            "Requesting answer"
        );
        let call = service.answer(
            &self.context.content,
            &self.context.topic_name,
            &self.question,
        );
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AnsweringError::Timeout(self.timeout)),
        }
    }
}

/// Sequences questions through an answering service for one signed-in session.
pub struct ChatController {
    context: Option<Arc<KnowledgeContext>>,
    state: SessionState,
    generation: u64,
    request_timeout: Duration,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl ChatController {
    /// Create a controller with no session. `submit` fails with `NoContext`
    /// until `initialize` is called.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            context: None,
            state: SessionState::default(),
            generation: 0,
            request_timeout,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> Option<&KnowledgeContext> {
        self.context.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending
    }

    /// Start a session on `context`: fresh log holding only the greeting.
    pub fn initialize(&mut self, context: KnowledgeContext) -> &SessionState {
        info!(topic = %context.topic_name, source = %context.source_label, "Chat session initialized");
        self.context = Some(Arc::new(context));
        self.restart();
        &self.state
    }

    /// Clear the log back to a single greeting. Any in-flight answer is
    /// discarded when it arrives.
    pub fn reset(&mut self) -> &SessionState {
        if self.state.pending {
            warn!(
                generation = self.generation,
                "Reset while an answer is pending; it will be discarded"
            );
        }
        self.restart();
        debug!(generation = self.generation, "Chat session reset");
        &self.state
    }

    /// Sign-out: drop the context and the log.
    pub fn end(&mut self) {
        self.context = None;
        self.generation += 1;
        self.state.clear();
        info!("Chat session ended");
    }

    fn restart(&mut self) {
        self.generation += 1;
        self.state.clear();
        if let Some(ctx) = &self.context {
            self.state.push(Message::assistant(greeting(&ctx.topic_name)));
        }
    }

    /// First phase of a submission.
    ///
    /// Rejects with `NoContext` before a session exists. Empty input and
    /// submissions while another answer is pending are ignored without
    /// touching the state.
    pub fn begin(&mut self, question: &str) -> Result<Submission, ChatError> {
        let Some(context) = &self.context else {
            warn!("Submission without a knowledge context");
            return Err(ChatError::NoContext);
        };

        let question = question.trim();
        if question.is_empty() {
            return Ok(Submission::Ignored(IgnoreReason::EmptyInput));
        }
        if self.state.pending {
            debug!("Submission ignored; an answer is already pending");
            return Ok(Submission::Ignored(IgnoreReason::Busy));
        }

        let pending = PendingAnswer {
            generation: self.generation,
            context: Arc::clone(context),
            question: question.to_string(),
            timeout: self.request_timeout,
        };
        self.state.push(Message::user(question));
        self.state.pending = true;
        self.state.last_error = None;
        Ok(Submission::Started(pending))
    }

    /// Second phase: record the outcome of `pending`.
    pub fn complete(
        &mut self,
        pending: &PendingAnswer,
        result: Result<String, AnsweringError>,
    ) -> SubmitOutcome {
        if pending.generation != self.generation {
            debug!(
                ticket = pending.generation,
                current = self.generation,
                "Discarding answer for a previous session generation"
            );
            return SubmitOutcome::Discarded;
        }

        self.state.pending = false;
        match result {
            Ok(answer) => {
                let message = Message::assistant(answer);
                self.state.push(message.clone());
                SubmitOutcome::Answered(message)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(error = %reason, retryable = err.is_retryable(), "Answering failed");
                let message = Message::assistant(error_reply(&reason));
                self.state.push(message.clone());
                self.state.last_error = Some(reason.clone());
                SubmitOutcome::Failed { message, reason }
            }
        }
    }

    /// Both phases in one call, for callers that simply await the answer.
    pub async fn submit(
        &mut self,
        service: &dyn AnsweringService,
        question: &str,
    ) -> Result<SubmitOutcome, ChatError> {
        let pending = match self.begin(question)? {
            Submission::Ignored(reason) => return Ok(SubmitOutcome::Ignored(reason)),
            Submission::Started(pending) => pending,
        };
        let result = pending.resolve(service).await;
        Ok(self.complete(&pending, result))
    }
}
