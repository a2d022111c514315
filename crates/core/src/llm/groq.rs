use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{ChatCompletionRequest, LlmClient, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
}

impl GroqClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(&settings.groq_base_url)
    }

    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn diagnostics(stage: &'static str, detail: String, raw_output: Option<String>) -> anyhow::Error {
        LlmDiagnosticsError {
            provider: Provider::Groq,
            stage,
            detail,
            raw_output,
        }
        .into()
    }

    fn response_text(text: &str) -> anyhow::Result<String> {
        let parsed = serde_json::from_str::<ChatCompletionResponse>(text).map_err(|e| {
            Self::diagnostics("decode", format!("invalid response JSON: {e}"), Some(text.to_string()))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                Self::diagnostics(
                    "decode",
                    "response has no message content".to_string(),
                    Some(text.to_string()),
                )
            })
    }
}

#[async_trait::async_trait]
impl LlmClient for GroqClient {
    fn provider(&self) -> Provider {
        Provider::Groq
    }

    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> anyhow::Result<String> {
        let body = CreateChatCompletion {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Groq request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Groq response body")?;
        if !status.is_success() {
            return Err(Self::diagnostics("http", format!("status={status}"), Some(text)));
        }

        Self::response_text(&text)
    }
}

#[derive(Debug, Serialize)]
struct CreateChatCompletion<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
