pub mod factory;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use common::{error::AppError, storage::types::message::Message};

use crate::search::SearchResult;

pub use factory::GraphRagEngineFactory;

/// Most recent messages forwarded with a query. Advisory in local-context
/// mode: the engine does not currently feed them into retrieval.
pub const QUERY_HISTORY_LIMIT: usize = 10;

// User-facing fallback text is bilingual, mirroring the frontend's audience.
pub const ENGINE_NOT_READY_REPLY: &str =
    "知识库引擎尚未初始化，请稍后重试或检查启动日志。(Knowledge base engine not initialized. Please try again later or check startup logs.)";
pub const NO_ANSWER_REPLY: &str =
    "抱歉，未能从知识库中找到明确的答案。(Sorry, could not find a clear answer in the knowledge base.)";

fn query_failed_reply(category: &str) -> String {
    format!("查询知识库时遇到错误，请稍后再试。(Error querying the knowledge base, please try again later.) ({category})")
}

/// The opaque answer engine boundary. Production uses [`crate::LocalSearch`];
/// tests substitute fakes.
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResult, AppError>;
}

/// Builds the engine from on-disk artifacts. Split out so initialization is
/// testable without real artifact stores or model endpoints.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(&self) -> Result<Arc<dyn AnswerEngine>, AppError>;
}

/// Owns the engine handle and its lifecycle. Initialization is expensive
/// (artifact tables, vector store connection, model clients), so it runs at
/// most once at a time behind `init_lock`; a caller arriving mid-build waits
/// for the holder and then re-checks. Once published, reads of the handle
/// never touch the init lock.
pub struct SearchEngineManager {
    factory: Arc<dyn EngineFactory>,
    init_lock: Mutex<()>,
    engine: RwLock<Option<Arc<dyn AnswerEngine>>>,
}

impl SearchEngineManager {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            init_lock: Mutex::new(()),
            engine: RwLock::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.current_engine().is_some()
    }

    fn current_engine(&self) -> Option<Arc<dyn AnswerEngine>> {
        self.engine
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(Arc::clone))
    }

    fn publish(&self, engine: Option<Arc<dyn AnswerEngine>>) {
        if let Ok(mut guard) = self.engine.write() {
            *guard = engine;
        }
    }

    /// Double-checked initialization. On failure the handle stays absent and
    /// the next caller retries the full sequence.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        if self.is_ready() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        info!("initializing search engine");
        match self.factory.build().await {
            Ok(engine) => {
                self.publish(Some(engine));
                info!("search engine initialized");
                Ok(())
            }
            Err(e) => {
                error!("search engine initialization failed: {e}");
                Err(e)
            }
        }
    }

    /// Drops the engine handle, typically after a reindex. The next query
    /// pays the full re-initialization cost.
    pub fn invalidate(&self) {
        self.publish(None);
        info!("search engine invalidated, will re-initialize on next query");
    }

    /// Single best-effort query. Never returns an error: failures come back
    /// as fixed user-facing fallback text while the logs keep the detail.
    pub async fn answer(&self, question: &str, history: &[Message]) -> String {
        if self.ensure_initialized().await.is_err() {
            return ENGINE_NOT_READY_REPLY.to_string();
        }
        let Some(engine) = self.current_engine() else {
            return ENGINE_NOT_READY_REPLY.to_string();
        };

        let recent_turns = history.len().min(QUERY_HISTORY_LIMIT);
        info!(question_chars = question.len(), recent_turns, "querying search engine");

        match engine.search(question).await {
            Ok(result) if result.response.trim().is_empty() => {
                warn!("query returned an empty response");
                NO_ANSWER_REPLY.to_string()
            }
            Ok(result) => result.response,
            Err(e) => {
                error!("query failed: {e}");
                query_failed_reply(e.category())
            }
        }
    }
}
