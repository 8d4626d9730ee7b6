use chrono::Utc;
use tracing::{debug, error, warn};

use crate::models::{Conversation, ConversationListItem, Message, SessionState};
use super::storage_service::SessionStorage;

/// In-memory conversations plus the visible message list, written through
/// to `SessionStorage` after every mutation.
pub struct ConversationStore {
    session: SessionState,
    messages: Vec<Message>,
    storage: SessionStorage,
    last_id: i64,
}

impl ConversationStore {
    /// Load the saved session and show the active conversation, if any
    pub fn open(storage: SessionStorage) -> Self {
        let session = storage.load();
        let messages = session
            .active()
            .map(|c| c.messages.clone())
            .unwrap_or_default();
        let last_id = session
            .conversations
            .iter()
            .filter_map(|c| c.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        Self {
            session,
            messages,
            storage,
            last_id,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The message list currently on screen
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn active_id(&self) -> Option<&str> {
        self.session.active_conversation_id.as_deref()
    }

    pub fn list_conversations(&self) -> Vec<ConversationListItem> {
        self.session.conversations.iter().map(ConversationListItem::from).collect()
    }

    /// Replace the visible list without touching any conversation. Used for
    /// the optimistic append before a conversation exists.
    pub fn show_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Create an empty conversation, put it first and make it active.
    /// Returns the new id.
    pub fn create_conversation(&mut self) -> String {
        let id = self.next_id();
        let conversation = Conversation::new(id.clone(), Utc::now());

        self.session.conversations.insert(0, conversation);
        self.session.active_conversation_id = Some(id.clone());
        self.messages.clear();
        self.persist();

        debug!(conversation_id = %id, "Created conversation");
        id
    }

    /// Open a stored conversation. Unknown ids are ignored.
    pub fn select_conversation(&mut self, id: &str) -> bool {
        let Some(conversation) = self.session.find(id) else {
            warn!(conversation_id = %id, "Cannot select unknown conversation");
            return false;
        };

        self.messages = conversation.messages.clone();
        self.session.active_conversation_id = Some(id.to_string());
        self.persist();
        true
    }

    /// Replace a conversation's messages. The title is derived from the first
    /// message only while it is still the placeholder.
    pub fn update_conversation(&mut self, id: &str, messages: Vec<Message>) -> bool {
        let is_active = self.session.is_active(id);
        let Some(conversation) = self.session.find_mut(id) else {
            debug!(conversation_id = %id, "Ignoring update for unknown conversation");
            return false;
        };

        if is_active {
            self.messages = messages.clone();
        }
        conversation.replace_messages(messages, Utc::now());
        self.persist();
        true
    }

    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let before = self.session.conversations.len();
        self.session.conversations.retain(|c| c.id != id);
        if self.session.conversations.len() == before {
            warn!(conversation_id = %id, "Cannot delete unknown conversation");
            return false;
        }

        if self.session.is_active(id) {
            self.session.active_conversation_id = None;
            self.messages.clear();
        }
        self.persist();
        true
    }

    pub fn dark_mode(&self) -> bool {
        self.storage.load_dark_mode()
    }

    pub fn set_dark_mode(&mut self, enabled: bool) {
        if let Err(e) = self.storage.save_dark_mode(enabled) {
            error!(error = %e, "Failed to save dark mode preference");
        }
    }

    /// Millisecond timestamp, bumped past the last id handed out so two
    /// conversations created in the same millisecond still differ.
    fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        self.last_id = now.max(self.last_id + 1);
        self.last_id.to_string()
    }

    fn persist(&mut self) {
        if let Err(e) = self.storage.save(&self.session) {
            error!(error = %e, "Failed to save conversations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PLACEHOLDER_TITLE;
    use crate::services::storage_service::MemoryStore;

    fn store_with(kv: &MemoryStore) -> ConversationStore {
        ConversationStore::open(SessionStorage::new(Box::new(kv.clone())))
    }

    fn store() -> ConversationStore {
        store_with(&MemoryStore::new())
    }

    #[test]
    fn create_prepends_and_activates() {
        let mut store = store();
        let first = store.create_conversation();
        let second = store.create_conversation();

        assert_ne!(first, second);
        assert_eq!(store.active_id(), Some(second.as_str()));
        let ids: Vec<_> = store.session().conversations.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn ids_are_monotonic() {
        let mut store = store();
        let ids: Vec<i64> = (0..5)
            .map(|_| store.create_conversation().parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn create_resets_visible_messages() {
        let mut store = store();
        store.show_messages(vec![Message::user("pending", None)]);
        store.create_conversation();
        assert!(store.messages().is_empty());
    }

    #[test]
    fn create_then_update_sets_messages_and_title() {
        let mut store = store();
        let id = store.create_conversation();
        let m = Message::user("Hello", None);

        assert!(store.update_conversation(&id, vec![m.clone()]));

        let conversation = store.session().find(&id).unwrap();
        assert_eq!(conversation.messages, vec![m.clone()]);
        assert_eq!(conversation.title, "Hello");
        assert_eq!(store.messages(), &[m]);
    }

    #[test]
    fn image_only_first_message_keeps_placeholder_title() {
        let mut store = store();
        let id = store.create_conversation();
        store.update_conversation(&id, vec![Message::user("", Some("data:image/png;base64,AA".into()))]);
        assert_eq!(store.session().find(&id).unwrap().title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn repeated_updates_keep_first_title() {
        let mut store = store();
        let id = store.create_conversation();
        let mut messages = vec![Message::user("What is Rust?", None), Message::assistant("")];

        store.update_conversation(&id, messages.clone());
        for snapshot in ["A", "A systems", "A systems language"] {
            messages[1] = Message::assistant(snapshot);
            store.update_conversation(&id, messages.clone());
        }

        let conversation = store.session().find(&id).unwrap();
        assert_eq!(conversation.title, "What is Rust?");
        assert_eq!(conversation.messages[1].text, "A systems language");
    }

    #[test]
    fn update_bumps_updated_at() {
        let mut store = store();
        let id = store.create_conversation();
        let before = store.session().find(&id).unwrap().updated_at;
        store.update_conversation(&id, vec![Message::user("hi", None)]);
        assert!(store.session().find(&id).unwrap().updated_at >= before);
    }

    #[test]
    fn update_unknown_conversation_is_noop() {
        let mut store = store();
        let id = store.create_conversation();
        assert!(!store.update_conversation("missing", vec![Message::user("x", None)]));
        assert!(store.session().find(&id).unwrap().messages.is_empty());
    }

    #[test]
    fn update_of_inactive_conversation_leaves_visible_list() {
        let mut store = store();
        let background = store.create_conversation();
        let foreground = store.create_conversation();
        store.update_conversation(&foreground, vec![Message::user("front", None)]);

        store.update_conversation(&background, vec![Message::user("back", None)]);
        assert_eq!(store.messages()[0].text, "front");
    }

    #[test]
    fn select_switches_visible_messages() {
        let mut store = store();
        let a = store.create_conversation();
        store.update_conversation(&a, vec![Message::user("in a", None)]);
        let b = store.create_conversation();
        assert!(store.messages().is_empty());

        assert!(store.select_conversation(&a));
        assert_eq!(store.active_id(), Some(a.as_str()));
        assert_eq!(store.messages()[0].text, "in a");

        assert!(!store.select_conversation("nope"));
        assert_eq!(store.active_id(), Some(a.as_str()));
        let _ = b;
    }

    #[test]
    fn deleting_active_clears_selection() {
        let mut store = store();
        let id = store.create_conversation();
        store.update_conversation(&id, vec![Message::user("bye", None)]);

        assert!(store.delete_conversation(&id));
        assert_eq!(store.active_id(), None);
        assert!(store.messages().is_empty());
        assert!(store.session().conversations.is_empty());
    }

    #[test]
    fn deleting_other_conversation_keeps_selection() {
        let mut store = store();
        let other = store.create_conversation();
        let active = store.create_conversation();
        store.update_conversation(&active, vec![Message::user("keep me", None)]);

        assert!(store.delete_conversation(&other));
        assert_eq!(store.active_id(), Some(active.as_str()));
        assert_eq!(store.messages()[0].text, "keep me");
    }

    #[test]
    fn mutations_are_persisted() {
        let kv = MemoryStore::new();
        let mut store = store_with(&kv);
        let id = store.create_conversation();
        store.update_conversation(&id, vec![Message::user("persist me", None)]);

        let reopened = store_with(&kv);
        assert_eq!(reopened.active_id(), Some(id.as_str()));
        assert_eq!(reopened.messages()[0].text, "persist me");
        assert_eq!(reopened.session().find(&id).unwrap().title, "persist me");
    }

    #[test]
    fn new_ids_never_collide_with_loaded_ones() {
        let kv = MemoryStore::new();
        let mut store = store_with(&kv);
        let far_future = (Utc::now().timestamp_millis() + 1_000_000).to_string();
        store.session.conversations.push(Conversation::new(far_future.clone(), Utc::now()));
        store.persist();

        let mut reopened = store_with(&kv);
        let id = reopened.create_conversation();
        assert!(id.parse::<i64>().unwrap() > far_future.parse::<i64>().unwrap());
    }

    #[test]
    fn dark_mode_round_trips_through_storage() {
        let kv = MemoryStore::new();
        let mut store = store_with(&kv);
        assert!(!store.dark_mode());
        store.set_dark_mode(true);
        assert!(store_with(&kv).dark_mode());
    }
}
