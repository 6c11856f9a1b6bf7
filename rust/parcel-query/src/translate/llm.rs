use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model credential is not configured")]
    MissingCredential,

    #[error("language model request failed: {0}")]
    Transport(String),

    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model response was malformed: {0}")]
    MalformedBody(String),
}

/// `(system prompt, user message) -> raw model text`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingCredential)?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| LlmError::MalformedBody(err.to_string()))?;

        message_content(&payload)
    }
}

fn message_content(payload: &Value) -> Result<String, LlmError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::MalformedBody("missing choices[0].message.content".into()))
}
