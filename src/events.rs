use chrono::{DateTime, Utc};

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRole {
    User,
    Assistant,
}

impl ConversationRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            ConversationRole::User => "You",
            ConversationRole::Assistant => "Assistant",
        }
    }
}

/// A single turn in the conversation. Never mutated after it is appended.
#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: ConversationRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ConversationRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ConversationRole::Assistant, content)
    }
}

/// Everything the chat session knows about the current conversation.
///
/// Lives for one run of the program; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub messages: Vec<ConversationMessage>,
    pub pending_input: String,
    pub is_awaiting_response: bool,
}

impl SessionState {
    /// Fresh state holding only the seeded assistant greeting.
    pub fn seeded(greeting: &str) -> Self {
        Self {
            messages: vec![ConversationMessage::assistant(greeting)],
            pending_input: String::new(),
            is_awaiting_response: false,
        }
    }
}
