//! Conversation data types
//!
//! These are independent of the terminal UI: the controller owns a
//! `Conversation` and the renderer only ever reads it.

use chrono::{DateTime, Local};
use uuid::Uuid;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn id_prefix(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "ai",
        }
    }
}

/// Which backend exchange a submission goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Text,
    Image,
}

impl ChatMode {
    pub fn label(&self) -> &'static str {
        match self {
            ChatMode::Text => "Chat",
            ChatMode::Image => "Image",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ChatMode::Text => ChatMode::Image,
            ChatMode::Image => ChatMode::Text,
        }
    }
}

/// A single exchanged message. Never edited after creation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// `data:image/png;base64,...` URI, only set on image replies
    pub image: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", role.id_prefix(), Uuid::new_v4()),
            role,
            content: content.into(),
            image: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_image(mut self, data_uri: impl Into<String>) -> Self {
        self.image = Some(data_uri.into());
        self
    }
}

/// Append-only list of messages in display order
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn last_image(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.image.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique_and_prefixed() {
        let a = Message::new(Role::User, "hi");
        let b = Message::new(Role::User, "hi");
        let c = Message::new(Role::Assistant, "hello");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("user-"));
        assert!(c.id.starts_with("ai-"));
        assert!(c.image.is_none());
    }

    #[test]
    fn test_conversation_keeps_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.push(Message::new(Role::User, "one"));
        conversation.push(Message::new(Role::User, "two"));
        conversation.push(Message::new(Role::Assistant, "three"));

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(conversation.last_assistant().unwrap().content, "three");
        assert!(conversation.last_image().is_none());
    }

    #[test]
    fn test_last_image_skips_text_replies() {
        let mut conversation = Conversation::new();
        conversation.push(Message::new(Role::Assistant, "pic").with_image("data:image/png;base64,AA"));
        conversation.push(Message::new(Role::Assistant, "words"));
        assert_eq!(conversation.last_image().unwrap().content, "pic");
    }

    #[test]
    fn test_mode_toggle() {
        assert_eq!(ChatMode::default(), ChatMode::Text);
        assert_eq!(ChatMode::Text.toggled(), ChatMode::Image);
        assert_eq!(ChatMode::Image.toggled().label(), "Chat");
    }
}
