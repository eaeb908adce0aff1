use std::sync::Arc;

use common::{storage::topic_store::TopicStore, utils::config::AppConfig};
use retrieval_pipeline::SearchEngineManager;

#[derive(Clone)]
pub struct ApiState {
    pub store: TopicStore,
    pub engine: Arc<SearchEngineManager>,
    pub config: AppConfig,
}

impl ApiState {
    pub fn new(store: TopicStore, engine: Arc<SearchEngineManager>, config: AppConfig) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }
}
