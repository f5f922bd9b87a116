use std::time::Duration;

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
};

/// Sampling parameters for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Raw completion text. `truncated` is set when the provider stopped at the token ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub truncated: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> AppResult<Completion>;
    fn model_id(&self) -> String;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingBody {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl ChatCompletionBody {
    fn into_completion(self) -> AppResult<Completion> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            AppError::ProviderError("Completion response contained no choices".to_string())
        })?;

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            truncated: choice.finish_reason.as_deref() == Some("length"),
        })
    }
}

/// Chat and embedding calls against an OpenAI-compatible endpoint.
pub struct OpenAiModelService {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    embedding_dimensions: u32,
}

impl OpenAiModelService {
    pub fn new(config: &Config) -> AppResult<Self> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.openai_api_key.expose_secret())
            .with_api_base(&config.openai_api_base);

        let http_client = reqwest::Client::builder()
            .timeout(config.openai_request_timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        // Rate limits must reach the caller; the scheduler owns every retry.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Ok(Self {
            client: Client::build(http_client, openai_config, no_retry),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dimensions: config.embedding_dimensions,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiModelService {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> AppResult<Completion> {
        log::debug!(
            "Requesting completion from {} (max_tokens={})",
            self.chat_model,
            params.max_output_tokens
        );

        let body: ChatCompletionBody = self
            .client
            .chat()
            .create_byot(json!({
                "model": self.chat_model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": params.temperature,
                "max_tokens": params.max_output_tokens,
            }))
            .await?;

        body.into_completion()
    }

    fn model_id(&self) -> String {
        self.chat_model.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiModelService {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let body: EmbeddingBody = self
            .client
            .embeddings()
            .create_byot(json!({
                "model": self.embedding_model,
                "input": text,
                "dimensions": self.embedding_dimensions,
            }))
            .await?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                AppError::ProviderError("Embedding response contained no vectors".to_string())
            })?;

        if embedding.len() != self.embedding_dimensions as usize {
            return Err(AppError::ProviderError(format!(
                "Expected {} embedding dimensions, got {}",
                self.embedding_dimensions,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}
