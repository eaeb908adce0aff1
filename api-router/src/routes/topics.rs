use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct NewTopicRequest {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn list_topics(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.list_topics().await)
}

pub async fn create_topic(
    State(state): State<ApiState>,
    Json(request): Json<NewTopicRequest>,
) -> impl IntoResponse {
    let topic = state.store.create_topic(request.name).await;
    (StatusCode::CREATED, Json(topic))
}

pub async fn get_topic(
    State(state): State<ApiState>,
    Path(topic_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .load_topic(&topic_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Topic not found".to_string()))
}

pub async fn delete_topic(
    State(state): State<ApiState>,
    Path(topic_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!(topic_id = %topic_id, "delete topic requested");
    if state.store.delete_topic(&topic_id).await {
        Ok(Json(json!({
            "message": format!("Topic {topic_id} deleted successfully.")
        })))
    } else {
        Err(ApiError::InternalError(format!(
            "could not delete topic file for id {topic_id}"
        )))
    }
}
