//! The `OpenAIClient` struct implements `ClientWrapper` for any OpenAI-compatible Chat
//! Completions endpoint and records token usage for the most recent request.
//!
//! # Example
//!
//! ```rust,no_run
//! use openstack_mcp::clients::openai::OpenAIClient;
//! use openstack_mcp::client_wrapper::{ClientWrapper, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let secret_key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_string(&secret_key, "gpt-4.1-mini");
//!
//!     let resp = client
//!         .send_message(&[
//!             Message::system("You are an OpenStack operator."),
//!             Message::user("What does SHUTOFF mean for a Nova server?"),
//!         ])
//!         .await?;
//!     println!("Assistant: {}", resp.content);
//!
//!     if let Some(usage) = client.get_last_usage().await {
//!         println!("Tokens: {} in, {} out", usage.input_tokens, usage.output_tokens);
//!     }
//!     Ok(())
//! }
//! ```
use std::error::Error;

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use tokio::sync::Mutex;

use crate::openstack_mcp::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
use crate::openstack_mcp::config::LlmConfig;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Client wrapper for OpenAI's Chat Completions API and compatible self-hosted endpoints.
pub struct OpenAIClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Model name that will be injected into each request.
    model: String,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and explicit model name.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new(secret_key),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Construct a client targeting a custom OpenAI compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_base_url(secret_key, base_url),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Build a client from [`LlmConfig`], honouring an optional base URL override.
    pub fn from_config(config: &LlmConfig) -> Self {
        match config.base_url.as_deref() {
            Some(base_url) => Self::new_with_base_url(&config.api_key, &config.model, base_url),
            None => Self::new_with_model_string(&config.api_key, &config.model),
        }
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let formatted_messages: Vec<chat::Message> = messages
            .iter()
            .map(|msg| chat::Message {
                role: msg.role.as_str().to_owned(),
                content: msg.content.clone(),
            })
            .collect();

        let chat_arguments = chat::ChatArguments::new(&self.model, formatted_messages);

        let response = match self
            .client
            .create_chat(chat_arguments, Some(CHAT_COMPLETIONS_PATH.to_string()))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                log::error!("OpenAIClient::send_message(...): API error: {}", err);
                return Err(format!("LLM request failed: {}", err).into());
            }
        };

        *self.token_usage.lock().await = Some(TokenUsage {
            input_tokens: response.usage.prompt_tokens as usize,
            output_tokens: response.usage.completion_tokens as usize,
            total_tokens: response.usage.total_tokens as usize,
        });

        let content = response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or("LLM response contained no choices")?;

        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
