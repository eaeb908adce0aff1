use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, info};

use crate::api_state::ApiState;

/// Triggers a reindex of the knowledge base. The engine handle is dropped
/// immediately and the external indexer runs as a detached background task;
/// requests are never blocked on it. The engine reloads everything lazily on
/// the first query after the run completes.
pub async fn trigger_ingestion(State(state): State<ApiState>) -> impl IntoResponse {
    info!("ingestion trigger received");
    state.engine.invalidate();

    let command = state.config.index_command.clone();
    let root_dir = state.config.graphrag_root_dir.clone();
    tokio::spawn(async move {
        match ingestion_pipeline::run_index(&command, &root_dir).await {
            Ok(()) => info!("background index run finished, engine will reload on next query"),
            Err(e) => error!("background index run failed: {e}"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Indexing started in background. The engine will reload on the next query after completion."
        })),
    )
}
