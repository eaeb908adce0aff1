use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{storage::topic_store::TopicStore, utils::config::get_config};
use retrieval_pipeline::{engine::GraphRagEngineFactory, SearchEngineManager};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let store = TopicStore::new(&config.chat_history_dir).await?;
    let factory = Arc::new(GraphRagEngineFactory::new(config.clone()));
    let engine = Arc::new(SearchEngineManager::new(factory));

    // Warm the engine in the background. A failure here is not fatal: queries
    // retry initialization and fall back to the not-ready reply until the
    // artifacts are in place.
    let warmup = Arc::clone(&engine);
    tokio::spawn(async move {
        if let Err(e) = warmup.ensure_initialized().await {
            warn!("engine warmup failed, will retry on first query: {e}");
        }
    });

    let state = ApiState::new(store, engine, config.clone());
    let app = Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
