//! Conversation model and the streaming session built on top of it.

pub mod controller;
pub mod events;
pub mod log;
pub mod message;
pub mod registry;
pub mod runtime;
pub mod scroll_manager;
pub mod snapshot;

pub use controller::{Dispatch, SessionController, SessionState};
pub use events::{Intent, StreamEventMapped, StreamEventPayload};
pub use log::MessageLog;
pub use message::{
    ConversationId, Message, MessageId, MessageStatus, Role, StreamSessionId, StreamState,
    StreamTarget, StreamTransition, StreamTransitionRejection, StreamTransitionResult,
};
pub use registry::{
    Conversation, ConversationRegistry, ConversationSeed, DEFAULT_CONVERSATION_TITLE,
    DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT, derive_title,
};
pub use runtime::{SessionHandle, SessionRuntime};
pub use scroll_manager::{AUTO_FOLLOW_THRESHOLD_PX, ScrollManager, should_auto_scroll};
pub use snapshot::{ConversationSummary, SessionSnapshot};
