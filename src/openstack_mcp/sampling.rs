//! Single-shot LLM sampling used by the analysis tools.
//!
//! Every tool call builds a fresh prompt, sends it once and returns the assistant text. There is
//! no conversation history and no retry.

use crate::openstack_mcp::client_wrapper::{ClientWrapper, Message};
use std::error::Error;

/// Send `prompt` (with an optional system prompt) and return the assistant's reply.
///
/// A blank reply is replaced with `fallback` so reports always have a body.
pub async fn sample(
    client: &dyn ClientWrapper,
    system_prompt: Option<&str>,
    prompt: &str,
    fallback: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));

    log::debug!(
        "sampling {} with {} prompt chars",
        client.model_name(),
        prompt.len()
    );
    let reply = client.send_message(&messages).await?;

    if reply.content.trim().is_empty() {
        Ok(fallback.to_string())
    } else {
        Ok(reply.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack_mcp::client_wrapper::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClient {
        reply: String,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ClientWrapper for RecordingClient {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn send_message(
            &self,
            messages: &[Message],
        ) -> Result<Message, Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(Message {
                role: Role::Assistant,
                content: self.reply.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_sample_with_system_prompt() {
        let client = RecordingClient {
            reply: "looks fine".to_string(),
            seen: Mutex::new(Vec::new()),
        };

        let text = sample(&client, Some("be terse"), "check this", "n/a")
            .await
            .unwrap();

        assert_eq!(text, "looks fine");
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, Role::System);
        assert_eq!(seen[1].role, Role::User);
        assert_eq!(seen[1].content, "check this");
    }

    #[tokio::test]
    async fn test_blank_reply_uses_fallback() {
        let client = RecordingClient {
            reply: "   ".to_string(),
            seen: Mutex::new(Vec::new()),
        };

        let text = sample(&client, None, "prompt", "no answer").await.unwrap();

        assert_eq!(text, "no answer");
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }
}
