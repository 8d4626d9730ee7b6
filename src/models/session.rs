use serde::{Deserialize, Serialize};

use super::chat::Conversation;

/// Everything that survives a restart: the conversation list (most recently
/// created first) and which of them is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub active_conversation_id: Option<String>,
    pub conversations: Vec<Conversation>,
}

impl SessionState {
    pub fn find(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_conversation_id
            .as_deref()
            .and_then(|id| self.find(id))
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_conversation_id.as_deref() == Some(id)
    }
}
