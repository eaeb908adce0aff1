pub mod artifacts;
pub mod chat_stream;
pub mod context;
pub mod engine;
pub mod search;
pub mod vector;

pub use chat_stream::{answer_stream, ChatEvent};
pub use engine::{AnswerEngine, EngineFactory, SearchEngineManager};
pub use search::{LocalSearch, SearchResult};
