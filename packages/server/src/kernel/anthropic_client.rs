//! Anthropic messages-API client implementation of BaseClassifier.
//!
//! The classifier is consumed as a black box: instruction + content blocks
//! in, raw text out. JSON extraction from the response happens at the
//! caller via `common::json_extract` — this client never interprets output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BaseClassifier, ContentBlock};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic API client for classification tasks.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    /// Create a new client with the given model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model,
            max_tokens: 1024,
            client,
        })
    }
}

#[async_trait]
impl BaseClassifier for AnthropicClient {
    async fn complete(&self, system: &str, blocks: Vec<ContentBlock>) -> Result<String> {
        let content = blocks
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text(text) => RequestBlock::Text { text },
                ContentBlock::Image {
                    media_type,
                    data_base64,
                } => RequestBlock::Image {
                    source: ImageSource {
                        source_type: "base64",
                        media_type,
                        data: data_base64,
                    },
                },
            })
            .collect();

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to send classifier request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Classifier API error {}: {}", status, body);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse classifier response")?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        tracing::debug!(
            model = %self.model,
            response_length = text.len(),
            "classifier response received"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires API key
    async fn test_complete() {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .expect("ANTHROPIC_API_KEY must be set for integration tests");

        let client =
            AnthropicClient::new(api_key, "claude-sonnet-4-20250514".to_string()).unwrap();

        let response = client
            .complete(
                "Answer with a single word.",
                vec![ContentBlock::text("Say 'hello' and nothing else.")],
            )
            .await
            .expect("completion should succeed");

        assert!(response.to_lowercase().contains("hello"));
    }
}
