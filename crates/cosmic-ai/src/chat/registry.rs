use std::time::SystemTime;

use super::log::MessageLog;
use super::message::{
    ConversationId, Message, MessageId, MessageStatus, Role, StreamState, StreamTransition,
    StreamTransitionResult,
};

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Titles longer than this many characters are cut and suffixed with [`TITLE_ELLIPSIS`].
pub const TITLE_MAX_CHARS: usize = 30;
pub const TITLE_ELLIPSIS: &str = "...";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Cosmic AI, a specialized assistant focused on astronomy, astrophysics, cosmology, space exploration, and all cosmic phenomena.";
pub const DEFAULT_GREETING: &str = "Hello! I'm Cosmic AI, your guide to the universe. How can I help you explore space and astronomy today?";

/// Derives a conversation title from the first user message.
pub fn derive_title(user_message: &str) -> String {
    if user_message.chars().count() > TITLE_MAX_CHARS {
        let mut title = user_message.chars().take(TITLE_MAX_CHARS).collect::<String>();
        title.push_str(TITLE_ELLIPSIS);
        title
    } else {
        user_message.to_string()
    }
}

/// Content every new conversation starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSeed {
    pub system_prompt: String,
    pub greeting: Option<String>,
    pub title: String,
}

impl Default for ConversationSeed {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
        }
    }
}

/// Conversation aggregate root: metadata, message log and request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub created_at: SystemTime,
    pub stream_state: StreamState,
    messages: MessageLog,
    title_is_placeholder: bool,
}

impl Conversation {
    fn new(id: ConversationId, title: String, messages: MessageLog) -> Self {
        Self {
            id,
            title,
            created_at: SystemTime::now(),
            stream_state: StreamState::Idle,
            messages,
            title_is_placeholder: true,
        }
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub(crate) fn messages_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }

    /// Appends a user turn, deriving the title the first time one arrives.
    pub fn append_user_message(&mut self, message: Message) -> bool {
        let content = message.content.clone();
        if !self.messages.append(message) {
            return false;
        }

        if self.title_is_placeholder {
            self.title = derive_title(&content);
            self.title_is_placeholder = false;
            tracing::debug!(
                conversation_id = ?self.id,
                title = %self.title,
                "derived conversation title"
            );
        }

        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.stream_state.is_in_flight()
    }

    /// Applies a deterministic stream transition.
    pub fn apply_stream_transition(
        &mut self,
        transition: StreamTransition,
    ) -> StreamTransitionResult {
        let next_state = self.stream_state.apply(transition)?;
        self.stream_state = next_state.clone();
        Ok(next_state)
    }
}

/// Ordered set of conversations plus the active selection.
#[derive(Debug, Clone)]
pub struct ConversationRegistry {
    seed: ConversationSeed,
    conversations: Vec<Conversation>,
    active_conversation_id: Option<ConversationId>,
    next_conversation_id: u64,
    next_message_id: u64,
}

impl ConversationRegistry {
    /// Creates an empty registry. Call [`Self::create`] for the start-up conversation.
    pub fn new(seed: ConversationSeed) -> Self {
        Self {
            seed,
            conversations: Vec::new(),
            active_conversation_id: None,
            next_conversation_id: 1,
            next_message_id: 1,
        }
    }

    /// Inserts a seeded conversation, makes it active and returns its id.
    pub fn create(&mut self) -> ConversationId {
        let id = ConversationId::new(self.next_conversation_id);
        self.next_conversation_id = self.next_conversation_id.saturating_add(1);

        let system = Message::system(self.alloc_message_id(), self.seed.system_prompt.clone());
        let mut messages = MessageLog::new(system);
        if let Some(greeting) = self.seed.greeting.clone() {
            let greeting = Message::new(
                self.alloc_message_id(),
                Role::Assistant,
                greeting,
                MessageStatus::Done,
            );
            messages.append(greeting);
        }

        self.conversations
            .push(Conversation::new(id, self.seed.title.clone(), messages));
        self.active_conversation_id = Some(id);

        tracing::info!(conversation_id = ?id, "created conversation");
        id
    }

    /// Makes `id` active. Unknown ids are ignored.
    pub fn select(&mut self, id: ConversationId) -> bool {
        if !self.contains(id) {
            tracing::debug!(conversation_id = ?id, "ignoring selection of unknown conversation");
            return false;
        }

        self.active_conversation_id = Some(id);
        true
    }

    /// Removes `id`; if it was active, the first remaining conversation becomes active.
    pub fn delete(&mut self, id: ConversationId) -> Option<Conversation> {
        let index = self
            .conversations
            .iter()
            .position(|conversation| conversation.id == id)?;
        let removed = self.conversations.remove(index);

        if self.active_conversation_id == Some(id) {
            self.active_conversation_id = self
                .conversations
                .first()
                .map(|conversation| conversation.id);
        }

        tracing::info!(
            conversation_id = ?id,
            active_conversation_id = ?self.active_conversation_id,
            "deleted conversation"
        );
        Some(removed)
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active_conversation_id
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_conversation_id.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == id)
    }

    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new(ConversationSeed::default())
    }
}
