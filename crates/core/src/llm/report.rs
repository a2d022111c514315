use crate::config::{CredentialStatus, Settings};
use crate::llm::groq::GroqClient;
use crate::llm::{ChatCompletionRequest, LlmClient};
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str =
    "You are a financial analyst AI assistant. Generate reports in Markdown.";
pub const TEMPERATURE: f32 = 0.6;
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Groq API key not configured. Please set the GROQ_API_KEY environment variable.";
pub const FAILURE_PREFIX: &str = "Failed to generate report";

#[derive(Clone)]
pub struct ReportGenerator {
    api_key: Option<String>,
    model: String,
    client: Arc<dyn LlmClient>,
}

impl ReportGenerator {
    pub fn new(api_key: Option<String>, model: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        Self {
            api_key,
            model: model.into(),
            client,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = GroqClient::from_settings(settings)?;
        Ok(Self::new(
            settings.groq_api_key.clone(),
            settings.groq_model.clone(),
            Arc::new(client),
        ))
    }

    pub fn credential_status(&self) -> CredentialStatus {
        if self.api_key.is_some() {
            CredentialStatus::Configured
        } else {
            CredentialStatus::Missing
        }
    }

    pub async fn generate(&self, prompt: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("report generation skipped: LLM credential missing");
            return NOT_CONFIGURED_MESSAGE.to_string();
        };

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            user: prompt.to_string(),
            temperature: TEMPERATURE,
        };

        tracing::info!(
            provider = ?self.client.provider(),
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "generating report"
        );
        match self.client.complete(api_key, &request).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "report generation failed");
                format!("{FAILURE_PREFIX}: {err:#}")
            }
        }
    }
}
