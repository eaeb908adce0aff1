use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, warn};

use crate::error::AppError;

use super::types::{
    message::Message,
    topic::{Topic, TopicInfo},
};

/// File-per-topic persistence. Each topic is one JSON file named by its
/// sanitized id under the store directory.
///
/// Concurrent appends to the same topic are load-modify-save over a full-file
/// overwrite, so the last writer wins. Accepted limitation: topics are
/// expected to have a single client each. Distinct topics never conflict.
#[derive(Clone, Debug)]
pub struct TopicStore {
    dir: PathBuf,
}

impl TopicStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates and persists a fresh topic. A persistence failure is logged
    /// and swallowed; the in-memory topic is returned regardless so the
    /// caller can respond, leaving the store inconsistent until retried.
    pub async fn create_topic(&self, name: Option<String>) -> Topic {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Topic {}", self.list_topics().await.len().saturating_add(1)),
        };

        let topic = Topic::new(name);
        if let Err(e) = self.save_topic(&topic).await {
            error!(topic_id = %topic.id, "failed to persist new topic: {e}");
        }
        info!(topic_id = %topic.id, name = %topic.name, "created topic");
        topic
    }

    /// Fails closed: invalid id, missing file and malformed content all
    /// come back as `None`.
    pub async fn load_topic(&self, id: &str) -> Option<Topic> {
        let path = match self.topic_path(id) {
            Ok(path) => path,
            Err(e) => {
                error!(topic_id = %id, "cannot load topic: {e}");
                return None;
            }
        };

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!(topic_id = %id, "failed to read topic file: {e}");
                return None;
            }
        };

        match serde_json::from_str::<Topic>(&raw) {
            Ok(topic) => Some(topic),
            Err(e) => {
                error!(topic_id = %id, "malformed topic file: {e}");
                None
            }
        }
    }

    /// Lists all loadable topics sorted case-insensitively by name. Topics
    /// that fail to load are skipped, so a partial failure yields a partial
    /// listing rather than an error.
    pub async fn list_topics(&self) -> Vec<TopicInfo> {
        let mut topics = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.dir.display(), "failed to list topic directory: {e}");
                return topics;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(topic) = self.load_topic(id).await {
                topics.push(TopicInfo::from_topic(&topic));
            }
        }

        topics.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        topics
    }

    /// Load-modify-save append. Returns the updated topic, or `None` when
    /// the topic does not exist. Save failures are logged and swallowed.
    pub async fn append_message(&self, id: &str, message: Message) -> Option<Topic> {
        let Some(mut topic) = self.load_topic(id).await else {
            warn!(topic_id = %id, "append to non-existent or unloadable topic");
            return None;
        };

        topic.messages.push(message);
        if let Err(e) = self.save_topic(&topic).await {
            error!(topic_id = %id, "failed to persist appended message: {e}");
        }
        Some(topic)
    }

    /// Idempotent delete: an already-absent topic counts as success. Returns
    /// `false` only when the id is invalid or the file still exists after a
    /// failed remove.
    pub async fn delete_topic(&self, id: &str) -> bool {
        let path = match self.topic_path(id) {
            Ok(path) => path,
            Err(e) => {
                error!(topic_id = %id, "cannot delete topic: {e}");
                return false;
            }
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(topic_id = %id, "deleted topic");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(topic_id = %id, "delete of already-absent topic");
                true
            }
            Err(e) => {
                error!(topic_id = %id, "failed to delete topic file: {e}");
                // The file may have gone away despite the error.
                !path.exists()
            }
        }
    }

    async fn save_topic(&self, topic: &Topic) -> Result<(), AppError> {
        let path = self.topic_path(&topic.id)?;
        let raw = serde_json::to_string_pretty(topic)?;
        fs::write(&path, raw).await?;
        Ok(())
    }

    fn topic_path(&self, id: &str) -> Result<PathBuf, AppError> {
        let sanitized = sanitize_id(id)?;
        Ok(self.dir.join(format!("{sanitized}.json")))
    }
}

/// Keeps only alphanumerics, `-` and `_`. An id that sanitizes to nothing is
/// rejected rather than silently mapped onto a shared filename.
pub fn sanitize_id(id: &str) -> Result<String, AppError> {
    let sanitized: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if sanitized.is_empty() {
        return Err(AppError::Validation(format!("invalid topic id: {id:?}")));
    }
    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::message::MessageRole;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, TopicStore) {
        let dir = tempdir().expect("tempdir");
        let store = TopicStore::new(dir.path()).await.expect("store");
        (dir, store)
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("abc-123_X").unwrap(), "abc-123_X");
        assert_eq!(sanitize_id("../../etc/passwd").unwrap(), "etcpasswd");
        assert!(sanitize_id("../").is_err());
        assert!(sanitize_id("").is_err());
    }

    #[tokio::test]
    async fn test_create_then_load_roundtrip() {
        let (_dir, store) = store().await;
        let topic = store.create_topic(Some("Algebra".to_string())).await;

        let loaded = store.load_topic(&topic.id).await.expect("topic");
        assert_eq!(loaded.name, "Algebra");
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn test_default_name_counts_existing_topics() {
        let (_dir, store) = store().await;
        let first = store.create_topic(None).await;
        assert_eq!(first.name, "Topic 1");
        let second = store.create_topic(None).await;
        assert_eq!(second.name, "Topic 2");
    }

    #[tokio::test]
    async fn test_load_absent_returns_none() {
        let (_dir, store) = store().await;
        assert!(store.load_topic("no-such-topic").await.is_none());
    }

    #[tokio::test]
    async fn test_load_invalid_id_returns_none() {
        let (_dir, store) = store().await;
        assert!(store.load_topic("///").await.is_none());
    }

    #[tokio::test]
    async fn test_load_malformed_file_returns_none() {
        let (dir, store) = store().await;
        tokio::fs::write(dir.path().join("broken.json"), "{not json")
            .await
            .unwrap();
        assert!(store.load_topic("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let (_dir, store) = store().await;
        let topic = store.create_topic(Some("Order".to_string())).await;

        for i in 0..5 {
            store
                .append_message(&topic.id, Message::new(MessageRole::User, format!("m{i}")))
                .await
                .expect("append");
        }

        let loaded = store.load_topic(&topic.id).await.expect("topic");
        let contents: Vec<_> = loaded.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_append_to_absent_topic_returns_none() {
        let (_dir, store) = store().await;
        let result = store
            .append_message("missing", Message::new(MessageRole::User, "hi"))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store().await;
        let topic = store.create_topic(Some("Doomed".to_string())).await;

        assert!(store.delete_topic(&topic.id).await);
        assert!(store.delete_topic(&topic.id).await);
        assert!(store.load_topic(&topic.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_invalid_id_fails() {
        let (_dir, store) = store().await;
        assert!(!store.delete_topic("///").await);
    }

    #[tokio::test]
    async fn test_list_sorted_case_insensitively() {
        let (_dir, store) = store().await;
        store.create_topic(Some("banana".to_string())).await;
        store.create_topic(Some("Apple".to_string())).await;
        store.create_topic(Some("cherry".to_string())).await;

        let names: Vec<_> = store
            .list_topics()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_list_skips_unloadable_topics() {
        let (dir, store) = store().await;
        store.create_topic(Some("Good".to_string())).await;
        tokio::fs::write(dir.path().join("bad.json"), "42")
            .await
            .unwrap();

        let listed = store.list_topics().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Good");
    }

    #[tokio::test]
    async fn test_list_includes_preview() {
        let (_dir, store) = store().await;
        let topic = store.create_topic(Some("Algebra".to_string())).await;
        assert_eq!(store.list_topics().await[0].preview, "New Topic");

        store
            .append_message(
                &topic.id,
                Message::new(MessageRole::User, "What is a derivative?"),
            )
            .await
            .expect("append");
        assert_eq!(store.list_topics().await[0].preview, "What is a derivative?");
    }
}
