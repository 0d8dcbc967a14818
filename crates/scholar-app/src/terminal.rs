//! Terminal front-end: renders the session and drives the controller.
//!
//! The loop reacts to three event sources: input lines, completed answers
//! and Ctrl-C. Answers run on their own task so `/reset` and `/quit` stay
//! responsive while a request is in flight.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;

use scholar_chat::{
    AnsweringError, AnsweringService, ChatController, IgnoreReason, PendingAnswer, Submission,
    SubmitOutcome,
};
use scholar_core::types::{Message, Sender};

const HELP: &str = "Type a question and press Enter.\n  /reset  start the conversation over\n  /help   show this help\n  /quit   sign out and exit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Reset,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Command::Ask(trimmed.to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "/reset" | "/new" => Command::Reset,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" | "/signout" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

pub fn render_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "You",
        Sender::Assistant => "Assistant",
        Sender::System => "System",
    };
    format!(
        "[{}] {}: {}",
        message.timestamp.with_timezone(&Local).format("%H:%M"),
        who,
        message.text
    )
}

/// Full-screen style error shown instead of a chat (configuration, sign-in).
pub fn render_blocking_error<W: Write>(out: &mut W, title: &str, detail: &str) -> io::Result<()> {
    let rule = "=".repeat(title.len().max(20));
    writeln!(out, "{}", rule)?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "{}", detail)?;
    Ok(())
}

fn notice<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "! {}", text)
}

/// Forward stdin lines into a channel from a dedicated thread.
///
/// Blocking reads live on their own OS thread so exiting never waits on a
/// pending read.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        use std::io::BufRead;
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

type Completion = (PendingAnswer, Result<String, AnsweringError>);

/// Resolve `pending` on its own task and report back on `tx`.
///
/// A task that fails (a panicking service) still reports, as an error, so
/// the session never stays pending.
fn spawn_answer(
    pending: PendingAnswer,
    service: Arc<dyn AnsweringService>,
    tx: mpsc::Sender<Completion>,
) {
    tokio::spawn(async move {
        let ticket = pending.clone();
        let worker = tokio::spawn(async move { pending.resolve(service.as_ref()).await });
        let result = match worker.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Answering task failed");
                Err(AnsweringError::NoAnswer(format!("answering task failed: {}", e)))
            }
        };
        let _ = tx.send((ticket, result)).await;
    });
}

/// Run the chat until `/quit`, Ctrl-C, or end of input.
///
/// At end of input an outstanding answer is still awaited and rendered.
pub async fn run<W: Write>(
    controller: &mut ChatController,
    service: Arc<dyn AnsweringService>,
    mut lines: mpsc::Receiver<String>,
    out: &mut W,
) -> io::Result<()> {
    let (answer_tx, mut answer_rx) = mpsc::channel::<Completion>(4);
    let mut input_closed = false;

    for message in &controller.state().messages {
        writeln!(out, "{}", render_message(message))?;
    }
    writeln!(out, "(type /help for commands)")?;

    loop {
        out.flush()?;
        tokio::select! {
            line = lines.recv(), if !input_closed => {
                let Some(line) = line else {
                    input_closed = true;
                    if controller.is_pending() {
                        continue;
                    }
                    break;
                };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Help => writeln!(out, "{}", HELP)?,
                    Command::Unknown(cmd) => {
                        notice(out, &format!("Unknown command {}. Type /help.", cmd))?
                    }
                    Command::Reset => {
                        for message in &controller.reset().messages {
                            writeln!(out, "{}", render_message(message))?;
                        }
                    }
                    Command::Ask(text) => match controller.begin(&text) {
                        Err(e) => notice(out, &e.to_string())?,
                        Ok(Submission::Ignored(IgnoreReason::EmptyInput)) => {}
                        Ok(Submission::Ignored(IgnoreReason::Busy)) => {
                            notice(out, "Still waiting for the previous answer; try again in a moment.")?
                        }
                        Ok(Submission::Started(pending)) => {
                            writeln!(out, "... thinking")?;
                            spawn_answer(pending, Arc::clone(&service), answer_tx.clone());
                        }
                    },
                }
            }
            Some((pending, result)) = answer_rx.recv() => {
                match controller.complete(&pending, result) {
                    SubmitOutcome::Answered(message) => {
                        writeln!(out, "{}", render_message(&message))?;
                    }
                    SubmitOutcome::Failed { message, reason } => {
                        writeln!(out, "{}", render_message(&message))?;
                        notice(out, &format!("Failed to get AI response: {}", reason))?;
                    }
                    SubmitOutcome::Discarded | SubmitOutcome::Ignored(_) => {}
                }
                if input_closed && !controller.is_pending() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                writeln!(out)?;
                break;
            }
        }
    }
    out.flush()
}
