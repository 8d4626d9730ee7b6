use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::models::Message;
use super::conversation_service::ConversationStore;
use super::llm_client::{LlmClient, UserTurn};

/// Where the in-flight exchange stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Submitting,
    Streaming,
    /// Carries the text shown to the user
    Error(String),
}

/// Notifications for the front end. Message lists are always sent whole so
/// the renderer can replace rather than patch.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StateChanged(ExchangeState),
    MessagesChanged(Vec<Message>),
    ConversationsChanged,
}

/// Receives `ChatEvent`s from the controller
pub trait EventSink {
    fn emit(&mut self, event: ChatEvent);
}

/// Text and image the user is composing but has not sent yet
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub text: String,
    pub image_url: Option<String>,
}

impl ChatInput {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image_url.is_none()
    }

    /// Snapshot the input as a turn and clear it
    fn take_turn(&mut self) -> UserTurn {
        UserTurn::new(&std::mem::take(&mut self.text), self.image_url.take())
    }
}

/// Whether a renderer should show the typing indicator
pub fn show_typing_indicator(messages: &[Message], streaming: bool) -> bool {
    streaming && messages.last().is_some_and(Message::is_placeholder)
}

/// Drives one exchange at a time: optimistic user message, conversation
/// bookkeeping, streaming into a placeholder, and the error path.
pub struct ChatController {
    conversations: ConversationStore,
    client: LlmClient,
    sink: Box<dyn EventSink>,
    state: ExchangeState,
}

impl ChatController {
    pub fn new(conversations: ConversationStore, client: LlmClient, sink: Box<dyn EventSink>) -> Self {
        Self {
            conversations,
            client,
            sink,
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != ExchangeState::Idle
    }

    pub fn messages(&self) -> &[Message] {
        self.conversations.messages()
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    pub fn is_typing(&self) -> bool {
        show_typing_indicator(self.messages(), self.state == ExchangeState::Streaming)
    }

    // ========================================================================
    // Conversation actions
    // ========================================================================

    /// Start an empty conversation and make it active
    pub fn new_chat(&mut self) -> ChatResult<String> {
        self.ensure_idle()?;
        let id = self.conversations.create_conversation();
        self.publish_conversations();
        Ok(id)
    }

    pub fn select(&mut self, id: &str) -> ChatResult<bool> {
        self.ensure_idle()?;
        let selected = self.conversations.select_conversation(id);
        if selected {
            self.publish_conversations();
        }
        Ok(selected)
    }

    pub fn delete(&mut self, id: &str) -> ChatResult<bool> {
        self.ensure_idle()?;
        let deleted = self.conversations.delete_conversation(id);
        if deleted {
            self.publish_conversations();
        }
        Ok(deleted)
    }

    pub fn dark_mode(&self) -> bool {
        self.conversations.dark_mode()
    }

    pub fn set_dark_mode(&mut self, enabled: bool) {
        self.conversations.set_dark_mode(enabled);
    }

    // ========================================================================
    // Exchange
    // ========================================================================

    /// Send what the user composed and stream the reply into the active
    /// conversation, creating one first if none is open.
    ///
    /// `input` is cleared as soon as the turn is taken from it. Transport and
    /// upstream failures are shown as a chat message and still return `Ok`;
    /// `Err` means the submission was refused and nothing changed.
    pub async fn submit(&mut self, input: &mut ChatInput) -> ChatResult<()> {
        self.ensure_idle()?;
        if input.is_empty() {
            return Err(ChatError::EmptySubmission);
        }

        let turn = input.take_turn();
        self.set_state(ExchangeState::Submitting);

        let history = self.conversations.messages().to_vec();
        let mut messages = history.clone();
        messages.push(Message::user(&turn.text, turn.image_url.clone()));
        self.conversations.show_messages(messages.clone());
        self.publish_messages();

        // Creating a conversation clears the visible list, so the update
        // carrying the user message must come after it
        let active = self.conversations.active_id().map(str::to_string);
        let conversation_id = match active {
            Some(id) => id,
            None => self.conversations.create_conversation(),
        };
        self.conversations.update_conversation(&conversation_id, messages.clone());
        self.publish_conversations();

        let request = self.client.build_request(&history, &turn);

        messages.push(Message::assistant(""));
        self.conversations.update_conversation(&conversation_id, messages.clone());
        self.set_state(ExchangeState::Streaming);
        self.publish_messages();

        debug!(conversation_id = %conversation_id, model = %self.client.config().model, "Streaming reply");

        let mut stream = self.client.stream_chat(request);
        let mut failure = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(snapshot) => {
                    if let Some(last) = messages.last_mut() {
                        *last = Message::assistant(&snapshot);
                    }
                    self.conversations.update_conversation(&conversation_id, messages.clone());
                    self.publish_messages();
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!(error = %e, conversation_id = %conversation_id, "Exchange failed");
            let text = self.failure_text(&e);

            // Partial content already shown stays; the error follows it
            if messages.last().is_some_and(Message::is_placeholder) {
                messages.pop();
            }
            messages.push(Message::assistant(&text));
            self.conversations.update_conversation(&conversation_id, messages);
            self.publish_messages();
            self.set_state(ExchangeState::Error(text));
        } else {
            info!(conversation_id = %conversation_id, "Exchange complete");
        }

        self.set_state(ExchangeState::Idle);
        Ok(())
    }

    /// User-facing failure text naming the cause and where the request went
    fn failure_text(&self, error: &ChatError) -> String {
        let config = self.client.config();
        format!(
            "Error: {}. Check that model \"{}\" is available at {}.",
            error, config.model, config.base_url
        )
    }

    fn ensure_idle(&self) -> ChatResult<()> {
        if self.is_busy() {
            return Err(ChatError::ExchangeInProgress);
        }
        Ok(())
    }

    fn set_state(&mut self, state: ExchangeState) {
        self.state = state.clone();
        self.sink.emit(ChatEvent::StateChanged(state));
    }

    fn publish_messages(&mut self) {
        let messages = self.conversations.messages().to_vec();
        self.sink.emit(ChatEvent::MessagesChanged(messages));
    }

    fn publish_conversations(&mut self) {
        self.sink.emit(ChatEvent::ConversationsChanged);
        self.publish_messages();
    }
}
