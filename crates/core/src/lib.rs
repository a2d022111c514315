pub mod context;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod pipeline;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
    pub const DEFAULT_GROQ_MODEL: &str = "moonshotai/kimi-k2-instruct";
    pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

    pub const MISSING_API_KEY_WARNING: &str =
        "Groq API key not found. Please set the `GROQ_API_KEY` environment variable.";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub groq_api_key: Option<String>,
        pub groq_base_url: String,
        pub groq_model: String,
        pub yahoo_base_url: String,
        pub yahoo_cookie_url: String,
        pub yahoo_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
        pub port: u16,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CredentialStatus {
        Configured,
        Missing,
    }

    impl CredentialStatus {
        pub fn is_configured(self) -> bool {
            matches!(self, CredentialStatus::Configured)
        }

        pub fn warning(self) -> Option<&'static str> {
            match self {
                CredentialStatus::Configured => None,
                CredentialStatus::Missing => Some(MISSING_API_KEY_WARNING),
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let yahoo_timeout_secs = match non_empty_var("YAHOO_TIMEOUT_SECS") {
                Some(s) => Some(
                    s.parse::<u64>()
                        .with_context(|| format!("YAHOO_TIMEOUT_SECS is not a number: {s}"))?,
                ),
                None => None,
            };

            Ok(Self {
                groq_api_key: non_empty_var("GROQ_API_KEY"),
                groq_base_url: non_empty_var("GROQ_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
                groq_model: non_empty_var("GROQ_MODEL")
                    .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                yahoo_base_url: non_empty_var("YAHOO_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string()),
                yahoo_cookie_url: non_empty_var("YAHOO_COOKIE_URL")
                    .unwrap_or_else(|| DEFAULT_YAHOO_COOKIE_URL.to_string()),
                yahoo_timeout_secs,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3000),
            })
        }

    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

}
