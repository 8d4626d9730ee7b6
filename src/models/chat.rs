use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Title every conversation carries until its first message is known
pub const PLACEHOLDER_TITLE: &str = "New Conversation";

/// Derived titles longer than this many characters are truncated
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role name used by the chat-completions wire format
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    pub fn user(text: &str, image_url: Option<String>) -> Self {
        Self {
            text: text.to_string(),
            sender: Sender::User,
            image_url,
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            text: text.to_string(),
            sender: Sender::Assistant,
            image_url: None,
        }
    }

    /// An assistant message with no content yet
    pub fn is_placeholder(&self) -> bool {
        self.sender == Sender::Assistant && self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_placeholder_title(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
    }

    /// Replace the message list, deriving the title from the first message
    /// while the placeholder is still in place.
    pub fn replace_messages(&mut self, messages: Vec<Message>, now: DateTime<Utc>) {
        if self.has_placeholder_title() {
            if let Some(title) = messages.first().and_then(|m| derive_title(&m.text)) {
                self.title = title;
            }
        }
        self.messages = messages;
        self.updated_at = now;
    }
}

/// Title for a conversation whose first message is `text`, or `None` when
/// the text is blank (an image-only first message).
///
/// Surrounding whitespace is trimmed before the 30-character cut, so
/// `"  Hello\n"` becomes `"Hello"` rather than a title padded with blanks.
pub fn derive_title(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let title = text.chars().take(TITLE_MAX_CHARS).collect::<String>();
    Some(if text.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", title)
    } else {
        title
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListItem {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationListItem {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            message_count: conversation.messages.len(),
            updated_at: conversation.updated_at,
        }
    }
}
