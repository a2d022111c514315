use std::fmt;

#[derive(Debug, Clone)]
pub struct DataFetchError {
    pub ticker: String,
    pub stage: &'static str,
    pub detail: String,
}

impl DataFetchError {
    pub fn new(ticker: &str, stage: &'static str, err: &anyhow::Error) -> Self {
        Self {
            ticker: ticker.to_string(),
            stage,
            detail: format!("{err:#}"),
        }
    }

    pub fn user_message(&self) -> String {
        format!(
            "Could not retrieve data for {}. Please check the ticker symbol and try again.",
            self.ticker
        )
    }
}

impl fmt::Display for DataFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data fetch failed (ticker={}, stage={}): {}",
            self.ticker, self.stage, self.detail
        )
    }
}

impl std::error::Error for DataFetchError {}
