use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use tracing::error;

use common::storage::{
    topic_store::TopicStore,
    types::message::{Message, MessageRole},
};

use crate::engine::SearchEngineManager;

/// Pacing between chunk events. Presentation parameter only: the engine
/// answers in one piece and the stream re-plays it incrementally.
pub const CHUNK_DELAY: Duration = Duration::from_millis(20);

pub const STREAM_ERROR_REPLY: &str =
    "抱歉，处理您的请求时发生内部错误。(Sorry, an internal error occurred while processing your request.)";

/// One frame of the chat stream. Serialized as `{"type": ...}` for the SSE
/// layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Start {
        topic_id: String,
    },
    Chunk {
        content: String,
    },
    Error {
        content: String,
    },
    End {
        topic_id: String,
        history: Vec<Message>,
    },
}

/// Bridges one synchronous answer into an ordered event sequence: `start`,
/// per-character `chunk`s whose concatenation reconstructs the answer
/// exactly, persistence of the assistant reply, and exactly one terminal
/// `end` carrying the updated history — also on the failure path, where the
/// fixed error reply is persisted and emitted instead.
///
/// The caller persists the user message before consuming the stream. A
/// client disconnect mid-stream keeps whatever was already persisted.
pub fn answer_stream(
    manager: Arc<SearchEngineManager>,
    store: TopicStore,
    topic_id: String,
    question: String,
    history: Vec<Message>,
) -> impl Stream<Item = ChatEvent> {
    stream! {
        yield ChatEvent::Start {
            topic_id: topic_id.clone(),
        };

        // The engine call is synchronous from the stream's point of view and
        // never fails: fallbacks are baked into the reply text.
        let reply = manager.answer(&question, &history).await;

        for ch in reply.chars() {
            yield ChatEvent::Chunk {
                content: ch.to_string(),
            };
            tokio::time::sleep(CHUNK_DELAY).await;
        }

        let assistant = Message::new(MessageRole::Assistant, reply);
        match store.append_message(&topic_id, assistant).await {
            Some(updated) => {
                yield ChatEvent::End {
                    topic_id,
                    history: updated.messages,
                };
            }
            None => {
                error!(topic_id = %topic_id, "failed to persist assistant reply");
                let fallback = Message::new(MessageRole::Assistant, STREAM_ERROR_REPLY);
                let _ = store.append_message(&topic_id, fallback).await;
                yield ChatEvent::Error {
                    content: STREAM_ERROR_REPLY.to_string(),
                };
                let history = store
                    .load_topic(&topic_id)
                    .await
                    .map(|topic| topic.messages)
                    .unwrap_or_default();
                yield ChatEvent::End { topic_id, history };
            }
        }
    }
}
