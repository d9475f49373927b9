use std::time::SystemTime;

use crate::chat::controller::SessionState;
use crate::chat::message::{ConversationId, Message, Role};
use crate::chat::registry::ConversationRegistry;

/// Sidebar row for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub created_at: SystemTime,
    pub in_flight: bool,
    pub is_active: bool,
}

/// Everything the presentation layer needs after one state change.
///
/// `messages` never contains the system message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation_id: Option<ConversationId>,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    /// Whether any conversation of the session is waiting on or receiving a reply.
    ///
    /// Sends are refused while this is set; each summary tells which conversation it is.
    pub in_flight: bool,
    pub last_error: Option<String>,
    pub draft_input: String,
    pub provider_configured: bool,
    pub scroll_to_bottom: bool,
}

impl SessionSnapshot {
    pub fn capture(
        registry: &ConversationRegistry,
        session: &SessionState,
        provider_configured: bool,
        scroll_to_bottom: bool,
    ) -> Self {
        let active_id = registry.active_id();
        let conversations = registry
            .conversations()
            .iter()
            .map(|conversation| ConversationSummary {
                id: conversation.id,
                title: conversation.title.clone(),
                created_at: conversation.created_at,
                in_flight: conversation.is_in_flight(),
                is_active: Some(conversation.id) == active_id,
            })
            .collect();

        let active = registry.active();
        let in_flight = registry
            .conversations()
            .iter()
            .any(|conversation| conversation.is_in_flight());
        Self {
            conversations,
            active_conversation_id: active_id,
            title: active.map(|conversation| conversation.title.clone()),
            messages: active
                .map(|conversation| conversation.messages().visible().cloned().collect())
                .unwrap_or_default(),
            in_flight,
            last_error: session.last_error.clone(),
            draft_input: session.draft_input.clone(),
            provider_configured,
            scroll_to_bottom,
        }
    }

    /// The assistant message currently receiving fragments, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant && message.is_streaming())
    }

    /// Whether the conversation on screen is the one with the reply in flight.
    ///
    /// Falls back to the session flag when no summaries were captured.
    pub fn active_in_flight(&self) -> bool {
        self.conversations
            .iter()
            .find(|summary| summary.is_active)
            .map_or(self.in_flight, |summary| summary.in_flight)
    }

    /// True while the active conversation waits for the first fragment of a reply.
    pub fn is_awaiting_first_fragment(&self) -> bool {
        self.active_in_flight() && self.streaming_message().is_none()
    }
}
