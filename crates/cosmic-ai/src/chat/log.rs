use super::message::{Message, MessageId, MessageStatus, Role};

/// Append-only record of turns in one conversation.
///
/// The first entry is always the system message. Entries are never removed or
/// reordered; the only in-place change is extending a streaming assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Creates a log seeded with its system message.
    pub fn new(system: Message) -> Self {
        debug_assert_eq!(system.role, Role::System);
        Self {
            messages: vec![system],
        }
    }

    /// Appends a non-system turn.
    ///
    /// System messages are only accepted as the seed, so they are ignored here.
    pub fn append(&mut self, message: Message) -> bool {
        if message.role == Role::System {
            tracing::warn!(
                message_id = ?message.id,
                "refusing to append a second system message"
            );
            return false;
        }

        self.messages.push(message);
        true
    }

    /// Extends a streaming assistant message with one fragment.
    pub fn extend(&mut self, message_id: MessageId, fragment: &str) -> bool {
        match self.find_mut(message_id) {
            Some(message) if message.is_streaming() => {
                message.content.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// Settles a streaming message into its final status.
    pub fn settle(&mut self, message_id: MessageId, status: MessageStatus) -> bool {
        match self.find_mut(message_id) {
            Some(message) if message.is_streaming() => {
                message.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn system(&self) -> &Message {
        &self.messages[0]
    }

    /// Messages shown to the user: everything except the system prompt.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|message| message.role != Role::System)
    }

    pub fn visible_len(&self) -> usize {
        self.messages.len() - 1
    }

    fn find_mut(&mut self, message_id: MessageId) -> Option<&mut Message> {
        // Streaming targets sit at the tail, so search backwards.
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.id == message_id)
    }
}
