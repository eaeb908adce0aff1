use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, MessageRole};

pub const PREVIEW_MAX_CHARS: usize = 50;
const EMPTY_PREVIEW: &str = "New Topic";

/// A persisted conversation thread. The id is generated once and never
/// changes; messages keep insertion order.
#[derive(Deserialize, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Topic {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            messages: Vec::new(),
        }
    }
}

/// Listing view over a topic. Derived on demand, never persisted.
#[derive(Deserialize, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopicInfo {
    pub id: String,
    pub name: String,
    pub preview: String,
}

impl TopicInfo {
    /// Preview is the first user message, else the first assistant message,
    /// else a fixed placeholder. Truncated at [`PREVIEW_MAX_CHARS`] with an
    /// ellipsis only when content was actually cut.
    pub fn from_topic(topic: &Topic) -> Self {
        let first_with_role = |role: MessageRole| {
            topic
                .messages
                .iter()
                .find(|m| m.role == role)
                .map(|m| m.content.as_str())
        };

        let preview = first_with_role(MessageRole::User)
            .or_else(|| first_with_role(MessageRole::Assistant))
            .map_or_else(|| EMPTY_PREVIEW.to_string(), truncate_preview);

        Self {
            id: topic.id.clone(),
            name: topic.name.clone(),
            preview,
        }
    }
}

fn truncate_preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_has_unique_id_and_no_messages() {
        let a = Topic::new("Algebra".to_string());
        let b = Topic::new("Algebra".to_string());
        assert_ne!(a.id, b.id);
        assert!(a.messages.is_empty());
    }

    #[test]
    fn test_preview_empty_topic() {
        let topic = Topic::new("Algebra".to_string());
        let info = TopicInfo::from_topic(&topic);
        assert_eq!(info.preview, "New Topic");
    }

    #[test]
    fn test_preview_prefers_first_user_message() {
        let mut topic = Topic::new("Algebra".to_string());
        topic
            .messages
            .push(Message::new(MessageRole::Assistant, "Welcome!"));
        topic
            .messages
            .push(Message::new(MessageRole::User, "What is a derivative?"));
        let info = TopicInfo::from_topic(&topic);
        assert_eq!(info.preview, "What is a derivative?");
    }

    #[test]
    fn test_preview_falls_back_to_assistant_message() {
        let mut topic = Topic::new("Algebra".to_string());
        topic
            .messages
            .push(Message::new(MessageRole::Assistant, "Welcome!"));
        let info = TopicInfo::from_topic(&topic);
        assert_eq!(info.preview, "Welcome!");
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "x".repeat(PREVIEW_MAX_CHARS + 1);
        let mut topic = Topic::new("Algebra".to_string());
        topic.messages.push(Message::new(MessageRole::User, long));
        let info = TopicInfo::from_topic(&topic);
        assert_eq!(info.preview.chars().count(), PREVIEW_MAX_CHARS + 3);
        assert!(info.preview.ends_with("..."));
    }

    #[test]
    fn test_preview_exact_length_keeps_full_content() {
        let exact = "y".repeat(PREVIEW_MAX_CHARS);
        let mut topic = Topic::new("Algebra".to_string());
        topic
            .messages
            .push(Message::new(MessageRole::User, exact.clone()));
        let info = TopicInfo::from_topic(&topic);
        assert_eq!(info.preview, exact);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(PREVIEW_MAX_CHARS + 5);
        let mut topic = Topic::new("Unicode".to_string());
        topic.messages.push(Message::new(MessageRole::User, long));
        let info = TopicInfo::from_topic(&topic);
        assert!(info.preview.ends_with("..."));
        assert_eq!(info.preview.chars().count(), PREVIEW_MAX_CHARS + 3);
    }
}
