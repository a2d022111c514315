pub mod error;
pub mod groq;
pub mod prompt;
pub mod report;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
}

/// A chat-completion backend. Implementations make exactly one request per call.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, api_key: &str, request: &ChatCompletionRequest)
        -> anyhow::Result<String>;
}
