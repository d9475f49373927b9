//! Plain-text rendering of session snapshots.
//!
//! The printer keeps track of what it has already written so that consecutive
//! snapshots only emit the new part of a streaming reply.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::chat::{ConversationId, Message, MessageId, MessageStatus, Role, SessionSnapshot};

const TYPING_INDICATOR: &str = "… Cosmic AI is thinking";

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "you",
        Role::Assistant => "cosmic",
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PrintedMessage {
    bytes: usize,
    settled: bool,
}

/// Writes the active conversation incrementally.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    conversation: Option<ConversationId>,
    printed: HashMap<MessageId, PrintedMessage>,
    /// Message whose line has not been terminated yet.
    open_line: Option<MessageId>,
    last_error: Option<String>,
    typing_shown: bool,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes whatever changed since the previous snapshot.
    pub fn render(&mut self, snapshot: &SessionSnapshot, out: &mut impl Write) -> io::Result<()> {
        if snapshot.active_conversation_id != self.conversation {
            self.close_line(out)?;
            self.conversation = snapshot.active_conversation_id;
            self.printed.clear();
            self.typing_shown = false;
            match &snapshot.title {
                Some(title) => writeln!(out, "== {title} ==")?,
                None => writeln!(out, "== no conversation ==")?,
            }
        }

        for message in &snapshot.messages {
            self.render_message(message, out)?;
        }

        if snapshot.is_awaiting_first_fragment() {
            if !self.typing_shown {
                self.close_line(out)?;
                writeln!(out, "{TYPING_INDICATOR}")?;
                self.typing_shown = true;
            }
        } else {
            self.typing_shown = false;
        }

        if snapshot.last_error != self.last_error {
            if let Some(error) = &snapshot.last_error {
                self.close_line(out)?;
                writeln!(out, "error: {error}")?;
            }
            self.last_error = snapshot.last_error.clone();
        }

        out.flush()
    }

    fn render_message(&mut self, message: &Message, out: &mut impl Write) -> io::Result<()> {
        let printed = self.printed.get(&message.id).copied();
        let state = match printed {
            Some(state) => {
                if state.settled {
                    return Ok(());
                }
                if self.open_line != Some(message.id) {
                    // Another line was written in between; continue on a fresh one.
                    self.close_line(out)?;
                    write!(out, "{}: ", role_label(message.role))?;
                }
                write!(out, "{}", message.content.get(state.bytes..).unwrap_or_default())?;
                state
            }
            None => {
                self.close_line(out)?;
                write!(out, "{}: {}", role_label(message.role), message.content)?;
                PrintedMessage::default()
            }
        };
        self.open_line = Some(message.id);

        let settled = !message.is_streaming();
        if settled {
            match &message.status {
                MessageStatus::Cancelled => write!(out, " [stopped]")?,
                MessageStatus::Error(_) => write!(out, " [incomplete]")?,
                MessageStatus::Streaming(_) | MessageStatus::Done => {}
            }
            self.close_line(out)?;
        }

        self.printed.insert(
            message.id,
            PrintedMessage {
                bytes: message.content.len().max(state.bytes),
                settled,
            },
        );
        Ok(())
    }

    fn close_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.open_line.take().is_some() {
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Writes one line per conversation, marking the active one.
pub fn write_conversation_list(snapshot: &SessionSnapshot, out: &mut impl Write) -> io::Result<()> {
    if snapshot.conversations.is_empty() {
        writeln!(out, "no conversations; /new starts one")?;
        return out.flush();
    }

    for summary in &snapshot.conversations {
        let marker = if summary.is_active { '*' } else { ' ' };
        let status = if summary.in_flight { " (replying)" } else { "" };
        writeln!(out, "{marker} {:>3}  {}{status}", summary.id.0, summary.title)?;
    }
    out.flush()
}
