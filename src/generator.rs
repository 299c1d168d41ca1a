//! Generator contract (spec.md §6): `generate(prompt, max_tokens, stop_list)
//! → text`, with an `async-openai`-backed default implementation pointed at
//! a local OpenAI-compatible server, grounded on the teacher's
//! `constrained/src/llm.rs::LlmClient`/`overlap/src/llm.rs`. The orchestrator
//! wraps whichever implementation it holds in a `tokio::sync::Mutex` to
//! satisfy the non-reentrancy requirement of spec.md §5 — this module stays
//! unaware of that and just exposes a plain async call.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AppError;

/// `generate(prompt, max_tokens, stop_list) → text`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, stop_list: &[String]) -> Result<String, AppError>;
}

/// Default generator: an OpenAI-compatible chat completion client, optionally
/// pointed at a local server via `OPENAI_BASE_URL` (mirrors the teacher's
/// `LlmClient::new`).
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAiGenerator {
    pub fn new(model: impl Into<String>) -> Result<Self, AppError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::Internal("OPENAI_API_KEY not set".to_string()))?;
        let mut config = OpenAIConfig::new().with_api_key(api_key);

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(config),
            model: model.into(),
            system_prompt: "You are a helpful financial table assistant.".to_string(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32, stop_list: &[String]) -> Result<String, AppError> {
        let system_message = ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(self.system_prompt.clone()),
            name: None,
        });
        let user_message = ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
            name: None,
        });

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(vec![system_message, user_message])
            .temperature(0.0)
            .max_tokens(max_tokens)
            .top_p(1.0)
            .frequency_penalty(0.0)
            .presence_penalty(0.0);
        if !stop_list.is_empty() {
            builder.stop(stop_list.to_vec());
        }
        let request = builder
            .build()
            .map_err(|e| AppError::Internal(format!("building chat request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::UpstreamFailure(format!("chat completion failed: {e}")))?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}
