use std::collections::HashMap;
use std::sync::Arc;

use crate::chat::events::{Intent, StreamEventMapped, StreamEventPayload};
use crate::chat::message::{
    ConversationId, Message, MessageId, MessageStatus, StreamSessionId, StreamTarget,
    StreamTransition,
};
use crate::chat::registry::{Conversation, ConversationRegistry};
use crate::chat::scroll_manager::ScrollManager;
use crate::chat::snapshot::SessionSnapshot;
use crate::llm::{
    EndpointFailure, LlmProvider, ProviderMessage, ProviderStreamHandle, StreamRequest,
    create_provider,
};
use crate::settings::CosmicSettings;

const STREAM_CLOSED_EARLY: &str = "provider stream ended before a terminal event";
const PROVIDER_NOT_CONFIGURED: &str =
    "Provider is not configured. Please set OPENAI_API_KEY and restart.";

/// Session-level state that is not owned by any one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub last_error: Option<String>,
    pub draft_input: String,
}

/// Controller-level stream metadata kept outside the conversation model.
#[derive(Debug, Clone, Copy)]
struct ActiveStream {
    target: StreamTarget,
    /// Created on the first fragment, so `None` while still waiting.
    assistant_message_id: Option<MessageId>,
}

/// Work the caller must perform after an intent has been applied.
pub enum Dispatch {
    None,
    /// Drive this stream and feed its events back through `apply_stream_event`.
    StartStream(ProviderStreamHandle),
    /// Stop reading this stream; dropping its event stream cancels the worker.
    CancelStream(StreamTarget),
}

/// Streaming session controller.
///
/// Owns the conversation registry and the session state, and is the only place
/// where either is mutated. Every method is synchronous; the runtime feeds it
/// intents and stream events one at a time.
pub struct SessionController {
    registry: ConversationRegistry,
    session: SessionState,
    provider: Option<Arc<dyn LlmProvider>>,
    configuration_error: Option<String>,
    active_streams: HashMap<ConversationId, ActiveStream>,
    next_stream_session_id: u64,
    scroll_manager: ScrollManager,
}

impl SessionController {
    /// Creates a controller; an empty registry gets its start-up conversation here.
    ///
    /// A configuration error is surfaced once as the initial `last_error`.
    pub fn new(
        mut registry: ConversationRegistry,
        provider: Option<Arc<dyn LlmProvider>>,
        configuration_error: Option<String>,
    ) -> Self {
        if registry.is_empty() {
            registry.create();
        }

        let configuration_error = match (&provider, configuration_error) {
            (None, None) => Some(PROVIDER_NOT_CONFIGURED.to_string()),
            (_, error) => error,
        };

        let mut scroll_manager = ScrollManager::new();
        scroll_manager.reset(
            registry
                .active()
                .map_or(0, |conversation| conversation.messages().visible_len()),
        );

        Self {
            registry,
            session: SessionState {
                last_error: configuration_error.clone(),
                draft_input: String::new(),
            },
            provider,
            configuration_error,
            active_streams: HashMap::new(),
            next_stream_session_id: 1,
            scroll_manager,
        }
    }

    /// Builds the provider from settings; a missing or invalid credential is not fatal.
    pub fn from_settings(settings: &CosmicSettings) -> Self {
        let registry = ConversationRegistry::new(settings.chat.to_seed());

        match create_provider(settings.provider.to_provider_config()) {
            Ok(provider) => {
                tracing::info!(
                    provider_id = %provider.id(),
                    model = %provider.model(),
                    "initialized provider from settings"
                );
                Self::new(registry, Some(provider), None)
            }
            Err(error) => {
                let failure = EndpointFailure::from(&error);
                tracing::error!(
                    stage = error.stage(),
                    status = failure.status,
                    error = %error,
                    "failed to initialize provider"
                );
                Self::new(registry, None, Some(failure.user_message()))
            }
        }
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.registry.active()
    }

    /// True while any request of the session is without a terminal outcome.
    pub fn in_flight(&self) -> bool {
        !self.active_streams.is_empty()
    }

    pub fn is_following_bottom(&self) -> bool {
        self.scroll_manager.is_following_bottom()
    }

    /// Applies one user intent.
    pub fn dispatch(&mut self, intent: Intent) -> Dispatch {
        match intent {
            Intent::Send(text) => self
                .send(&text)
                .map_or(Dispatch::None, Dispatch::StartStream),
            Intent::SetDraft(text) => {
                self.set_draft(text);
                Dispatch::None
            }
            Intent::NewConversation => {
                self.new_conversation();
                Dispatch::None
            }
            Intent::SelectConversation(id) => {
                self.select_conversation(id);
                Dispatch::None
            }
            Intent::DeleteConversation(id) => self
                .delete_conversation(id)
                .map_or(Dispatch::None, Dispatch::CancelStream),
            Intent::Stop => self.stop().map_or(Dispatch::None, Dispatch::CancelStream),
            Intent::ViewportScrolled {
                distance_from_bottom,
            } => {
                self.scroll_manager.update_follow_state(distance_from_bottom);
                Dispatch::None
            }
        }
    }

    /// Appends a user turn to the active conversation and opens its stream.
    ///
    /// Blank text, a request already in flight anywhere in the session, or no active
    /// conversation are silently rejected. A missing provider records the configuration error instead.
    pub fn send(&mut self, text: &str) -> Option<ProviderStreamHandle> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank submit");
            return None;
        }

        let Some(conversation_id) = self.registry.active_id() else {
            tracing::debug!("ignoring submit without an active conversation");
            return None;
        };

        if let Some(active) = self.active_streams.values().next() {
            tracing::debug!(
                conversation_id = ?conversation_id,
                in_flight = ?active.target,
                "ignoring submit while a request is in flight"
            );
            return None;
        }

        let Some(provider) = self.provider.clone() else {
            let error = self
                .configuration_error
                .clone()
                .unwrap_or_else(|| PROVIDER_NOT_CONFIGURED.to_string());
            tracing::warn!(conversation_id = ?conversation_id, "cannot send without a provider");
            self.session.last_error = Some(error);
            return None;
        };

        let user_message_id = self.registry.alloc_message_id();
        let target = StreamTarget::new(conversation_id, self.alloc_stream_session_id());

        let request_messages = {
            let conversation = self.registry.get_mut(conversation_id)?;
            if let Err(rejection) =
                conversation.apply_stream_transition(StreamTransition::Start(target))
            {
                tracing::debug!(?rejection, "stream start rejected");
                return None;
            }

            conversation.append_user_message(Message::user(user_message_id, text));
            Self::build_provider_messages(conversation)
        };

        self.session.draft_input.clear();
        self.session.last_error = None;
        self.scroll_manager.request_scroll_to_bottom();
        self.observe_displayed(conversation_id, false);

        let request = StreamRequest::new(target, request_messages);
        match provider.stream_chat(request) {
            Ok(handle) => {
                self.active_streams.insert(
                    conversation_id,
                    ActiveStream {
                        target,
                        assistant_message_id: None,
                    },
                );
                tracing::info!(target = ?target, provider_id = %provider.id(), "stream requested");
                Some(handle)
            }
            Err(error) => {
                let failure = EndpointFailure::from(&error);
                tracing::error!(
                    target = ?target,
                    stage = error.stage(),
                    error = %error,
                    "failed to open stream"
                );
                if let Some(conversation) = self.registry.get_mut(conversation_id) {
                    if let Err(rejection) =
                        conversation.apply_stream_transition(StreamTransition::Fail {
                            target,
                            message: failure.user_message(),
                        })
                    {
                        tracing::debug!(target = ?target, ?rejection, "stream failure rejected");
                    }
                }
                self.session.last_error = Some(failure.user_message());
                None
            }
        }
    }

    /// Applies one stream event to the conversation that issued the stream.
    ///
    /// Returns false for events of streams that are no longer current.
    pub fn apply_stream_event(&mut self, event: StreamEventMapped) -> bool {
        let target = event.target;
        let conversation_id = target.conversation_id;
        let Some(mut active) = self.current_stream(target) else {
            tracing::debug!(target = ?target, "dropping stale stream event");
            return false;
        };

        let new_message_id = match (&event.payload, active.assistant_message_id) {
            (StreamEventPayload::Delta(text), _) if text.is_empty() => return false,
            (StreamEventPayload::Delta(_), None) => Some(self.registry.alloc_message_id()),
            _ => None,
        };

        let Some(conversation) = self.registry.get_mut(conversation_id) else {
            self.active_streams.remove(&conversation_id);
            return false;
        };

        if let Err(rejection) = conversation.apply_stream_transition(event.transition()) {
            tracing::debug!(target = ?target, ?rejection, "stream transition rejected");
            return false;
        }

        let mut content_grew = false;
        match event.payload {
            StreamEventPayload::Delta(text) => {
                match (active.assistant_message_id, new_message_id) {
                    (Some(message_id), _) => {
                        content_grew = conversation.messages_mut().extend(message_id, &text);
                    }
                    (None, Some(message_id)) => {
                        conversation.messages_mut().append(Message::assistant_streaming(
                            message_id,
                            target.session_id,
                            text,
                        ));
                        active.assistant_message_id = Some(message_id);
                        self.active_streams.insert(conversation_id, active);
                    }
                    (None, None) => {}
                }
            }
            StreamEventPayload::Done => {
                if let Some(message_id) = active.assistant_message_id {
                    conversation
                        .messages_mut()
                        .settle(message_id, MessageStatus::Done);
                }
                self.active_streams.remove(&conversation_id);
                tracing::info!(target = ?target, "stream completed");
            }
            StreamEventPayload::Error(message) => {
                // Partial content stays in the log; only its status changes.
                if let Some(message_id) = active.assistant_message_id {
                    conversation
                        .messages_mut()
                        .settle(message_id, MessageStatus::Error(message.clone()));
                }
                self.active_streams.remove(&conversation_id);
                tracing::warn!(target = ?target, error = %message, "stream failed");
                self.session.last_error = Some(message);
            }
        }

        self.observe_displayed(conversation_id, content_grew);
        true
    }

    /// Handles the event stream closing; without a terminal event this is a transport error.
    pub fn stream_closed(&mut self, target: StreamTarget) -> bool {
        if self.current_stream(target).is_none() {
            return false;
        }

        tracing::warn!(target = ?target, "provider stream closed without a terminal event");
        self.apply_stream_event(StreamEventMapped::error(target, STREAM_CLOSED_EARLY))
    }

    pub fn set_draft(&mut self, text: String) {
        self.session.draft_input = text;
    }

    /// Creates and activates a new conversation. Streams of other conversations keep running.
    pub fn new_conversation(&mut self) -> ConversationId {
        let id = self.registry.create();
        self.reset_scroll();
        id
    }

    pub fn select_conversation(&mut self, id: ConversationId) -> bool {
        if self.registry.active_id() == Some(id) {
            return true;
        }

        if !self.registry.select(id) {
            return false;
        }

        self.reset_scroll();
        true
    }

    /// Deletes a conversation, returning its in-flight stream so the caller can cancel it.
    pub fn delete_conversation(&mut self, id: ConversationId) -> Option<StreamTarget> {
        let was_active = self.registry.active_id() == Some(id);
        self.registry.delete(id)?;

        if was_active {
            self.reset_scroll();
        }

        let cancelled = self.active_streams.remove(&id).map(|active| active.target);
        if let Some(target) = cancelled {
            tracing::info!(target = ?target, "cancelled stream of deleted conversation");
        }
        cancelled
    }

    /// Cancels the session's in-flight stream, keeping any partial content.
    ///
    /// The stream may belong to a conversation other than the active one.
    pub fn stop(&mut self) -> Option<StreamTarget> {
        let conversation_id = *self.active_streams.keys().next()?;
        let active = self.active_streams.remove(&conversation_id)?;
        let conversation = self.registry.get_mut(conversation_id)?;

        if let Err(rejection) =
            conversation.apply_stream_transition(StreamTransition::Cancel(active.target))
        {
            tracing::debug!(target = ?active.target, ?rejection, "stream cancel rejected");
        }
        if let Some(message_id) = active.assistant_message_id {
            conversation
                .messages_mut()
                .settle(message_id, MessageStatus::Cancelled);
        }

        tracing::info!(target = ?active.target, "stream stopped by user");
        Some(active.target)
    }

    /// Captures the presentation snapshot, consuming any pending scroll request.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        let scroll_to_bottom = self.scroll_manager.apply_pending_scroll();
        SessionSnapshot::capture(
            &self.registry,
            &self.session,
            self.provider.is_some(),
            scroll_to_bottom,
        )
    }

    fn current_stream(&self, target: StreamTarget) -> Option<ActiveStream> {
        let active = self.active_streams.get(&target.conversation_id)?;
        let accepted = active.target == target
            && self
                .registry
                .get(target.conversation_id)
                .is_some_and(|conversation| conversation.stream_state.accepts_stream_event(target));
        accepted.then_some(*active)
    }

    fn observe_displayed(&mut self, conversation_id: ConversationId, content_grew: bool) {
        if self.registry.active_id() != Some(conversation_id) {
            return;
        }

        if let Some(conversation) = self.registry.active() {
            let visible = conversation.messages().visible_len();
            self.scroll_manager.observe_messages(visible, content_grew);
        }
    }

    fn reset_scroll(&mut self) {
        let visible = self
            .registry
            .active()
            .map_or(0, |conversation| conversation.messages().visible_len());
        self.scroll_manager.reset(visible);
    }

    fn build_provider_messages(conversation: &Conversation) -> Vec<ProviderMessage> {
        conversation
            .messages()
            .as_slice()
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| ProviderMessage::new(message.role, message.content.clone()))
            .collect()
    }

    fn alloc_stream_session_id(&mut self) -> StreamSessionId {
        let id = StreamSessionId::new(self.next_stream_session_id);
        self.next_stream_session_id = self.next_stream_session_id.saturating_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::llm::testing::{ScriptStep, ScriptedProvider};

    fn controller_with(provider: Arc<ScriptedProvider>) -> SessionController {
        SessionController::new(ConversationRegistry::default(), Some(provider), None)
    }

    fn send_and_target(controller: &mut SessionController, text: &str) -> StreamTarget {
        let handle = controller.send(text).expect("send accepted");
        handle.stream.target()
    }

    fn active_contents(controller: &SessionController) -> Vec<(Role, String)> {
        controller
            .active_conversation()
            .unwrap()
            .messages()
            .as_slice()
            .iter()
            .map(|message| (message.role, message.content.clone()))
            .collect()
    }

    #[test]
    fn blank_sends_change_nothing() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider.clone());
        let before = controller.active_conversation().unwrap().messages().len();

        assert!(controller.send("").is_none());
        assert!(controller.send("   ").is_none());

        assert_eq!(controller.active_conversation().unwrap().messages().len(), before);
        assert!(!controller.in_flight());
        assert!(provider.requests().is_empty());
    }

    #[test]
    fn send_appends_user_turn_and_requests_full_history() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider.clone());
        controller.set_draft("Tell me about black holes".to_string());

        let _handle = controller.send("Tell me about black holes").unwrap();

        assert!(controller.in_flight());
        assert!(controller.session().draft_input.is_empty());
        assert_eq!(controller.session().last_error, None);
        assert_eq!(
            controller.active_conversation().unwrap().title,
            "Tell me about black holes"
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let roles = requests[0]
            .messages
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();
        assert_eq!(roles, [Role::System, Role::Assistant, Role::User]);
    }

    #[test]
    fn second_send_while_in_flight_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider.clone());

        let _handle = controller.send("first").unwrap();
        let len = controller.active_conversation().unwrap().messages().len();

        assert!(controller.send("second").is_none());
        assert_eq!(controller.active_conversation().unwrap().messages().len(), len);
        assert_eq!(provider.requests().len(), 1);
    }

    #[test]
    fn fragments_extend_a_single_assistant_message() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "greet me");
        let before = controller.active_conversation().unwrap().messages().len();

        for fragment in ["Hello", ", ", "world"] {
            assert!(controller.apply_stream_event(StreamEventMapped::delta(target, fragment)));
        }
        assert!(controller.apply_stream_event(StreamEventMapped::done(target)));

        let conversation = controller.active_conversation().unwrap();
        assert_eq!(conversation.messages().len(), before + 1);
        let last = conversation.messages().as_slice().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello, world");
        assert_eq!(last.status, MessageStatus::Done);
        assert!(!controller.in_flight());
    }

    #[test]
    fn transport_error_keeps_partial_content() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "the moon?");

        controller.apply_stream_event(StreamEventMapped::delta(target, "The Moon"));
        controller.apply_stream_event(StreamEventMapped::error(target, "connection reset"));

        assert!(!controller.in_flight());
        assert_eq!(
            controller.session().last_error.as_deref(),
            Some("connection reset")
        );
        let last = active_contents(&controller).pop().unwrap();
        assert_eq!(last, (Role::Assistant, "The Moon".to_string()));
    }

    #[test]
    fn next_send_clears_the_previous_error() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "one");
        controller.apply_stream_event(StreamEventMapped::error(target, "boom"));
        assert!(controller.session().last_error.is_some());

        let _handle = controller.send("two").unwrap();
        assert_eq!(controller.session().last_error, None);
    }

    #[test]
    fn closing_without_terminal_event_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "hi");

        assert!(controller.stream_closed(target));
        assert!(!controller.in_flight());
        assert_eq!(
            controller.session().last_error.as_deref(),
            Some(STREAM_CLOSED_EARLY)
        );
        // A close after the terminal event is a no-op.
        assert!(!controller.stream_closed(target));
    }

    #[test]
    fn fragments_follow_their_conversation_after_switching() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let first = controller.registry().active_id().unwrap();
        let target = send_and_target(&mut controller, "first question");

        let second = controller.new_conversation();
        assert_eq!(controller.registry().active_id(), Some(second));
        assert!(controller.in_flight());
        assert!(!controller.snapshot().active_in_flight());

        controller.apply_stream_event(StreamEventMapped::delta(target, "answer"));
        controller.apply_stream_event(StreamEventMapped::done(target));

        let first_log = controller.registry().get(first).unwrap().messages();
        assert_eq!(first_log.as_slice().last().unwrap().content, "answer");
        let second_log = controller.registry().get(second).unwrap().messages();
        assert_eq!(second_log.visible_len(), 1, "only the greeting");
    }

    #[test]
    fn send_in_another_conversation_is_rejected_while_one_streams() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider.clone());
        let first = send_and_target(&mut controller, "first");

        let second = controller.new_conversation();
        let before = controller.active_conversation().unwrap().messages().len();
        assert!(controller.send("second").is_none());
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(controller.active_conversation().unwrap().messages().len(), before);
        assert_eq!(controller.active_conversation().unwrap().id, second);

        let snapshot = controller.snapshot();
        assert!(snapshot.in_flight);
        assert!(
            snapshot
                .conversations
                .iter()
                .any(|summary| summary.id == first.conversation_id && summary.in_flight)
        );

        controller.apply_stream_event(StreamEventMapped::done(first));
        assert!(!controller.in_flight());
        assert!(controller.send("second").is_some());
        assert_eq!(provider.requests().len(), 2);
    }

    #[test]
    fn stop_reaches_a_stream_outside_the_active_conversation() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "tell me about Mars");
        controller.apply_stream_event(StreamEventMapped::delta(target, "Mars is"));
        controller.new_conversation();

        assert_eq!(controller.stop(), Some(target));
        assert!(!controller.in_flight());
        let first = controller.registry().get(target.conversation_id).unwrap();
        let last = first.messages().as_slice().last().unwrap();
        assert_eq!(last.content, "Mars is");
        assert_eq!(last.status, MessageStatus::Cancelled);
        assert_eq!(controller.stop(), None);
    }

    #[test]
    fn stale_events_are_dropped() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let old = send_and_target(&mut controller, "one");
        controller.apply_stream_event(StreamEventMapped::done(old));
        let _current = send_and_target(&mut controller, "two");

        assert!(!controller.apply_stream_event(StreamEventMapped::delta(old, "late")));
        assert!(
            active_contents(&controller)
                .iter()
                .all(|(_, content)| content != "late")
        );
    }

    #[test]
    fn failed_stream_open_settles_the_conversation() {
        let provider = Arc::new(ScriptedProvider::new().with_script(vec![ScriptStep::Refuse]));
        let mut controller = controller_with(provider.clone());

        assert!(controller.send("first").is_none());
        assert!(!controller.in_flight());
        assert!(controller.session().last_error.is_some());
        assert!(!controller.active_conversation().unwrap().is_in_flight());

        assert!(controller.send("again").is_some());
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(controller.session().last_error, None);
    }

    #[test]
    fn stop_cancels_and_keeps_partial_content() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "count to ten");
        controller.apply_stream_event(StreamEventMapped::delta(target, "1, 2"));

        assert_eq!(controller.stop(), Some(target));
        assert!(!controller.in_flight());
        assert_eq!(controller.session().last_error, None);

        let conversation = controller.active_conversation().unwrap();
        let last = conversation.messages().as_slice().last().unwrap();
        assert_eq!(last.content, "1, 2");
        assert_eq!(last.status, MessageStatus::Cancelled);
        assert!(!controller.apply_stream_event(StreamEventMapped::delta(target, ", 3")));
    }

    #[test]
    fn deleting_streaming_conversation_cancels_its_stream() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let doomed = controller.registry().active_id().unwrap();
        let target = send_and_target(&mut controller, "hi");
        let survivor = controller.new_conversation();
        controller.select_conversation(doomed);

        assert_eq!(controller.delete_conversation(doomed), Some(target));
        assert_eq!(controller.registry().active_id(), Some(survivor));
        assert!(!controller.apply_stream_event(StreamEventMapped::delta(target, "x")));
    }

    #[test]
    fn deleting_last_conversation_leaves_no_active_one() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider.clone());
        let only = controller.registry().active_id().unwrap();

        controller.delete_conversation(only);
        assert_eq!(controller.registry().active_id(), None);
        assert!(controller.send("anyone there?").is_none());
        assert!(provider.requests().is_empty());
        assert!(controller.snapshot().messages.is_empty());
    }

    #[test]
    fn missing_provider_surfaces_configuration_error_without_request() {
        let mut controller = SessionController::new(
            ConversationRegistry::default(),
            None,
            Some("Missing API key".to_string()),
        );
        assert_eq!(
            controller.session().last_error.as_deref(),
            Some("Missing API key")
        );

        controller.session.last_error = None;
        controller.set_draft("hello".to_string());
        assert!(controller.send("hello").is_none());

        assert_eq!(
            controller.session().last_error.as_deref(),
            Some("Missing API key")
        );
        assert_eq!(controller.session().draft_input, "hello");
        assert_eq!(controller.active_conversation().unwrap().messages().len(), 2);
    }

    #[test]
    fn settings_without_key_start_unconfigured() {
        let mut controller = SessionController::from_settings(&CosmicSettings::default());

        assert!(!controller.snapshot().provider_configured);
        assert!(
            controller
                .session()
                .last_error
                .as_deref()
                .is_some_and(|error| error.contains("Missing API key"))
        );
        assert_eq!(controller.registry().len(), 1);
    }

    #[test]
    fn send_forces_scroll_even_when_scrolled_up() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        controller.snapshot();
        controller.dispatch(Intent::ViewportScrolled {
            distance_from_bottom: 500.0,
        });
        assert!(!controller.is_following_bottom());

        let _handle = controller.send("look up").unwrap();
        assert!(controller.is_following_bottom());
        assert!(controller.snapshot().scroll_to_bottom);
    }

    #[test]
    fn scrolled_up_viewport_is_not_moved_by_fragments() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut controller = controller_with(provider);
        let target = send_and_target(&mut controller, "long answer please");
        controller.snapshot();
        controller.dispatch(Intent::ViewportScrolled {
            distance_from_bottom: 0.0,
        });
        controller.dispatch(Intent::ViewportScrolled {
            distance_from_bottom: 800.0,
        });

        controller.apply_stream_event(StreamEventMapped::delta(target, "Once"));
        assert!(!controller.snapshot().scroll_to_bottom);
        controller.apply_stream_event(StreamEventMapped::delta(target, " upon a time"));
        assert!(!controller.snapshot().scroll_to_bottom);
    }
}
