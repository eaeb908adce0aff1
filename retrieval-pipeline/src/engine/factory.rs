use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tracing::{info, warn};

use common::{
    error::AppError,
    utils::config::{get_engine_settings, resolve_api_key, AppConfig, ModelSettings},
};

use crate::artifacts::{verify_artifacts, ArtifactTables};
use crate::context::{ContextParams, MixedContextBuilder};
use crate::engine::{AnswerEngine, EngineFactory};
use crate::search::LocalSearch;
use crate::vector::EntityVectorStore;

/// Production engine factory: loads the on-disk index artifacts, verifies
/// the vector store, and wires model clients into a [`LocalSearch`]. Every
/// step can fail independently and aborts the whole build.
pub struct GraphRagEngineFactory {
    config: AppConfig,
    params: ContextParams,
}

impl GraphRagEngineFactory {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            params: ContextParams::default(),
        }
    }

    pub fn with_params(mut self, params: ContextParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl EngineFactory for GraphRagEngineFactory {
    async fn build(&self) -> Result<Arc<dyn AnswerEngine>, AppError> {
        let output_dir = self.config.output_dir();

        verify_artifacts(&output_dir)?;
        let tables = ArtifactTables::load(&output_dir).await?;

        let vector_store =
            EntityVectorStore::connect(&self.config.qdrant_url, &self.config.entity_collection)?;
        vector_store.verify_collection().await?;

        // Settings are re-read on every build so an edited settings file is
        // picked up after an invalidate, and a missing one only fails the
        // engine, never the process.
        let settings = get_engine_settings(&self.config.graphrag_root_dir)?;
        let chat = &settings.default_chat_model;
        let embedding = &settings.default_embedding_model;
        info!(
            chat_model = %chat.model,
            embedding_model = %embedding.model,
            encoding = %chat.encoding_model,
            "resolved model configuration"
        );

        let chat_client = Arc::new(model_client(chat));
        let embedding_client = model_client(embedding);

        let bpe = Arc::new(resolve_bpe(&chat.model)?);

        let context_builder = MixedContextBuilder::new(
            tables,
            vector_store,
            embedding_client,
            embedding.model.clone(),
            Arc::clone(&bpe),
            self.params.clone(),
        );

        let engine = LocalSearch::new(
            chat_client,
            chat.model.clone(),
            context_builder,
            chat.max_tokens,
            chat.temperature,
        );

        Ok(Arc::new(engine))
    }
}

fn model_client(settings: &ModelSettings) -> Client<OpenAIConfig> {
    let api_key = resolve_api_key(settings.api_key.as_deref());
    if api_key.is_none() {
        warn!(model = %settings.model, "api key unresolved, continuing keyless");
    }

    let mut config = OpenAIConfig::new().with_api_base(&settings.api_base);
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    Client::with_config(config)
}

fn resolve_bpe(model: &str) -> Result<CoreBPE, AppError> {
    match get_bpe_from_model(model) {
        Ok(bpe) => Ok(bpe),
        Err(e) => {
            warn!(model, "no tokenizer for model, falling back to cl100k_base: {e}");
            Ok(cl100k_base()?)
        }
    }
}
