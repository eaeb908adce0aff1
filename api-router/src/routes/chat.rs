use std::{pin::Pin, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;

use common::storage::types::message::{Message, MessageRole};
use retrieval_pipeline::{answer_stream, engine::QUERY_HISTORY_LIMIT};

use crate::api_state::ApiState;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

fn recent_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .rev()
        .take(QUERY_HISTORY_LIMIT)
        .rev()
        .cloned()
        .collect()
}

fn error_stream(message: impl Into<String>) -> EventStream {
    let message = message.into();
    stream::once(async move { Ok(Event::default().event("error").data(message)) }).boxed()
}

/// Accepts a user message for a topic and replies with the pseudo-streamed
/// answer: the user turn is persisted up front, then the chat stream replays
/// the single engine answer as SSE frames and persists the assistant turn.
pub async fn post_message(
    State(state): State<ApiState>,
    Path(topic_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Sse<EventStream> {
    if request.message.trim().is_empty() {
        return Sse::new(error_stream("Missing 'message' field in request body"));
    }

    let Some(topic) = state.store.load_topic(&topic_id).await else {
        return Sse::new(error_stream("Topic not found"));
    };

    // Bounded recent history, snapshotted before the new user turn is
    // appended; advisory for the engine in local-context mode.
    let history = recent_history(&topic.messages);

    let user_message = Message::new(MessageRole::User, request.message.clone());
    if state
        .store
        .append_message(&topic_id, user_message)
        .await
        .is_none()
    {
        return Sse::new(error_stream("Failed to persist user message"));
    }

    let events = answer_stream(
        Arc::clone(&state.engine),
        state.store.clone(),
        topic_id,
        request.message,
        history,
    )
    .map(|event| Event::default().json_data(&event));

    Sse::new(events.boxed()).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
