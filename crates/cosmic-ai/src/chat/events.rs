use crate::chat::message::{ConversationId, StreamTarget, StreamTransition};

/// User intents accepted by the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Submit `text` to the active conversation.
    Send(String),
    /// Replace the draft input.
    SetDraft(String),
    NewConversation,
    SelectConversation(ConversationId),
    DeleteConversation(ConversationId),
    /// Cancel the session's in-flight stream, whichever conversation it belongs to.
    Stop,
    /// Viewport moved; `distance_from_bottom` is in pixels.
    ViewportScrolled { distance_from_bottom: f32 },
}

/// Provider-agnostic stream payload mapped into chat domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    Delta(String),
    Done,
    Error(String),
}

/// Emitted after provider stream events are mapped into domain events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    pub fn delta(target: StreamTarget, text: impl Into<String>) -> Self {
        Self {
            target,
            payload: StreamEventPayload::Delta(text.into()),
        }
    }

    pub fn done(target: StreamTarget) -> Self {
        Self {
            target,
            payload: StreamEventPayload::Done,
        }
    }

    pub fn error(target: StreamTarget, message: impl Into<String>) -> Self {
        Self {
            target,
            payload: StreamEventPayload::Error(message.into()),
        }
    }

    /// Maps payloads to stream state transitions.
    ///
    /// Deltas map to `Receive`, which is a no-op once the stream is already `Streaming`.
    pub fn transition(&self) -> StreamTransition {
        match &self.payload {
            StreamEventPayload::Delta(_) => StreamTransition::Receive(self.target),
            StreamEventPayload::Done => StreamTransition::Complete(self.target),
            StreamEventPayload::Error(message) => StreamTransition::Fail {
                target: self.target,
                message: message.clone(),
            },
        }
    }
}
