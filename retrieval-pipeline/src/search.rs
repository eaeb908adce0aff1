use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, info};

use common::error::AppError;

use crate::context::MixedContextBuilder;
use crate::engine::AnswerEngine;

const SEARCH_SYSTEM_PROMPT: &str = r"You are a helpful assistant answering questions about the knowledge base described by the data tables below.
Base your answer on the provided tables; when they do not contain the answer, say so.
Write multiple paragraphs where the material supports it.

Data tables:
{context}";

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub response: String,
}

/// The answer engine: assembles a local context for the question and runs a
/// single chat completion over it.
pub struct LocalSearch {
    chat_client: Arc<Client<OpenAIConfig>>,
    model: String,
    context_builder: MixedContextBuilder,
    max_tokens: u32,
    temperature: f32,
}

impl LocalSearch {
    pub fn new(
        chat_client: Arc<Client<OpenAIConfig>>,
        model: String,
        context_builder: MixedContextBuilder,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            chat_client,
            model,
            context_builder,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl AnswerEngine for LocalSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, AppError> {
        let context = self.context_builder.build_context(query).await?;
        debug!(context_chars = context.len(), "assembled search context");

        let system_message = SEARCH_SYSTEM_PROMPT.replace("{context}", &context);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .messages([
                ChatCompletionRequestSystemMessage::from(system_message).into(),
                ChatCompletionRequestUserMessage::from(query).into(),
            ])
            .build()?;

        let response = self.chat_client.chat().create(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        info!(response_chars = content.len(), "local search completed");
        Ok(SearchResult { response: content })
    }
}
