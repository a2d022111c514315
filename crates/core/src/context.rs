pub const WEB_CONTEXT_PLACEHOLDER: &str = "Live web search is not enabled. No recent news articles or web snippets were retrieved for this company; rely on the provided market data and general sector conditions.";

#[async_trait::async_trait]
pub trait WebContextProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn search(&self, company_name: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderWebContext;

#[async_trait::async_trait]
impl WebContextProvider for PlaceholderWebContext {
    fn provider_name(&self) -> &'static str {
        "placeholder"
    }

    async fn search(&self, _company_name: &str) -> Vec<String> {
        vec![WEB_CONTEXT_PLACEHOLDER.to_string()]
    }
}
