//! Chat-completion client used by the extraction, question and audit routes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;

pub const EMPTY_CONTENT_REPLY: &str = "Error: No text content provided for analysis.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_content: &str,
        model: &str,
    ) -> Result<String, LlmError>;
}

/// Sends one prompt and always returns text: the model reply, or a
/// description of why there is none.
pub async fn query_llm(
    client: &dyn LlmClient,
    system_prompt: Option<&str>,
    user_content: &str,
    model: &str,
) -> String {
    if user_content.is_empty() {
        return EMPTY_CONTENT_REPLY.to_string();
    }

    match client.complete(system_prompt, user_content, model).await {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, %model, "llm request failed");
            format!("LLM API Error: {err}")
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.openai_base_url.clone(), config.openai_api_key.clone())
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn build_messages<'a>(system_prompt: Option<&'a str>, user_content: &'a str) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: user_content,
    });
    messages
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_content: &str,
        model: &str,
    ) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingCredential)?;

        let payload = ChatCompletionRequest {
            model,
            messages: build_messages(system_prompt, user_content),
            temperature: 0.0,
        };

        let url = self.completions_url();
        debug!(%url, %model, content_bytes = user_content.len(), "sending chat completion request");
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("response contained no choices".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
