use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    chat::post_message,
    ingest::trigger_ingestion,
    liveness::live,
    readiness::ready,
    topics::{create_topic, delete_topic, get_topic, list_topics},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/topics", get(list_topics).post(create_topic))
        .route("/topics/{topic_id}", get(get_topic).delete(delete_topic))
        .route("/topics/{topic_id}/messages", post(post_message))
        .route("/ingest", post(trigger_ingestion))
}
