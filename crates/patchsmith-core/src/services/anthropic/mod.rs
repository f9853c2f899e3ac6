use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::sync::Arc;
use std::{env, fmt::Debug};

use crate::shared::config::Settings;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StreamResponse {
    #[serde(rename = "type")]
    response_type: String,
    index: Option<i32>,
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
}

pub type MessageCallback = Box<dyn FnMut(String) + Send + 'static>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one prompt and returns the full response text. `on_chunk` is
    /// invoked with each streamed text delta as it arrives.
    async fn generate(&self, prompt: String, on_chunk: MessageCallback) -> Result<String>;
}

#[derive(Clone)]
pub enum AnthropicClient {
    Real {
        client: Client,
        api_key: String,
        model: String,
        max_tokens: u32,
    },
    #[cfg(test)]
    Mock(Arc<MockModelClient>),
}

impl AnthropicClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;

        Ok(Self::Real {
            client: Client::new(),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    #[cfg(test)]
    pub fn mock(mock: MockModelClient) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real { model, .. } => f
                .debug_struct("AnthropicClient")
                .field("model", model)
                .finish(),
            #[cfg(test)]
            Self::Mock(_) => f.write_str("AnthropicClient::Mock"),
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn generate(&self, prompt: String, mut on_chunk: MessageCallback) -> Result<String> {
        match self {
            Self::Real {
                client,
                api_key,
                model,
                max_tokens,
            } => {
                let request_body = ClaudeRequest {
                    model: model.clone(),
                    messages: vec![Message {
                        role: "user".to_string(),
                        content: prompt,
                    }],
                    max_tokens: *max_tokens,
                    stream: true,
                };

                let response = client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("accept", "application/json")
                    .header("content-type", "application/json")
                    .header("x-api-key", api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&request_body)
                    .send()
                    .await?;

                if response.status() != StatusCode::OK {
                    let error_text = response.text().await?;
                    tracing::error!("API request failed: {}", error_text);
                    anyhow::bail!("API request failed: {}", error_text);
                }

                let mut stream = response.bytes_stream();
                let mut assistant_message = String::new();

                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?.to_vec();
                    let text = String::from_utf8_lossy(&chunk);

                    for line in text.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                continue;
                            }

                            if let Ok(event) = serde_json::from_str::<StreamResponse>(data) {
                                if let Some(delta) = event.delta {
                                    if delta.delta_type == "text_delta" {
                                        if let Some(text) = delta.text {
                                            assistant_message.push_str(&text);
                                            on_chunk(text);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }

                Ok(assistant_message)
            }
            #[cfg(test)]
            Self::Mock(mock) => mock.as_ref().generate(prompt, on_chunk).await,
        }
    }
}
