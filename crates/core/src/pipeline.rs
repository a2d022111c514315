use crate::config::{CredentialStatus, Settings};
use crate::context::{PlaceholderWebContext, WebContextProvider};
use crate::domain::snapshot::StockSnapshot;
use crate::ingest::error::DataFetchError;
use crate::ingest::provider::MarketDataClient;
use crate::ingest::yahoo::YahooFinanceClient;
use crate::llm::prompt;
use crate::llm::report::ReportGenerator;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PreparedReport {
    pub snapshot: StockSnapshot,
    pub web_context: Vec<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub snapshot: StockSnapshot,
    pub web_context: Vec<String>,
    pub report: String,
}

#[derive(Clone)]
pub struct StockAnalyzer {
    market: MarketDataClient,
    web: Arc<dyn WebContextProvider>,
    generator: ReportGenerator,
}

impl StockAnalyzer {
    pub fn new(
        market: MarketDataClient,
        web: Arc<dyn WebContextProvider>,
        generator: ReportGenerator,
    ) -> Self {
        Self {
            market,
            web,
            generator,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let yahoo = YahooFinanceClient::from_settings(settings)?;
        Ok(Self::new(
            MarketDataClient::new(Arc::new(yahoo)),
            Arc::new(PlaceholderWebContext),
            ReportGenerator::from_settings(settings)?,
        ))
    }

    pub fn credential_status(&self) -> CredentialStatus {
        self.generator.credential_status()
    }

    pub async fn prepare(&self, ticker: &str) -> Result<PreparedReport, DataFetchError> {
        let snapshot = self.market.fetch(ticker).await.inspect_err(|err| {
            tracing::error!(ticker, error = %err, "market data fetch failed");
        })?;

        let web_context = self.web.search(&snapshot.company_name).await;
        tracing::info!(
            ticker,
            provider = self.web.provider_name(),
            snippets = web_context.len(),
            "web context collected"
        );

        let prompt = prompt::build(
            &snapshot,
            &web_context,
            &snapshot.company_name,
            &snapshot.ticker,
        );

        Ok(PreparedReport {
            snapshot,
            web_context,
            prompt,
        })
    }

    pub async fn generate(&self, prompt: &str) -> String {
        self.generator.generate(prompt).await
    }

    pub async fn analyze(&self, ticker: &str) -> Result<Analysis, DataFetchError> {
        let prepared = self.prepare(ticker).await?;
        let report = self.generate(&prepared.prompt).await;
        tracing::info!(ticker, report_chars = report.chars().count(), "analysis finished");

        Ok(Analysis {
            snapshot: prepared.snapshot,
            web_context: prepared.web_context,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WEB_CONTEXT_PLACEHOLDER;
    use crate::domain::snapshot::{
        PriceBar, BRIEF_INFO_KEYS, NO_RECOMMENDATIONS, STATEMENT_EMPTY, SUPPLEMENT_UNAVAILABLE,
    };
    use crate::domain::table::DataTable;
    use crate::ingest::provider::{MarketDataSource, StatementKind};
    use crate::llm::prompt::REPORT_SECTIONS;
    use crate::llm::report::NOT_CONFIGURED_MESSAGE;
    use crate::llm::{ChatCompletionRequest, LlmClient, Provider};
    use chrono::{Duration, NaiveDate};
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeMarket {
        fail_info: bool,
        fail_history: bool,
        fail_recommendations: bool,
        empty_statements: bool,
        bars: usize,
        info_calls: AtomicUsize,
        history_calls: AtomicUsize,
    }

    impl FakeMarket {
        fn with_bars(bars: usize) -> Self {
            Self {
                bars,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl MarketDataSource for FakeMarket {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_info(&self, ticker: &str) -> anyhow::Result<Map<String, Value>> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(!self.fail_info, "Quote not found for symbol: {ticker}");
            Ok(json!({
                "symbol": ticker,
                "longName": format!("{ticker} Corp"),
                "sector": "Technology",
                "industry": "Consumer Electronics",
                "longBusinessSummary": "Designs and sells devices.",
                "marketCap": 3_400_000_000_000_i64,
                "companyOfficers": [{"name": "A. Person", "title": "CEO"}]
            })
            .as_object()
            .cloned()
            .unwrap_or_default())
        }

        async fn fetch_history_1y(&self, _ticker: &str) -> anyhow::Result<Vec<PriceBar>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(!self.fail_history, "No data found, symbol may be delisted");
            let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
            Ok((0..self.bars)
                .map(|i| PriceBar {
                    date: start + Duration::days(i as i64),
                    open: 200.0,
                    high: 202.0,
                    low: 198.0,
                    close: 201.0,
                    volume: 50_000_000,
                })
                .collect())
        }

        async fn fetch_major_holders(&self, _ticker: &str) -> anyhow::Result<DataTable> {
            let mut t = DataTable::new("Breakdown", vec!["Value".into()]);
            t.push_row("insidersPercentHeld", vec!["0.0171".into()]);
            Ok(t)
        }

        async fn fetch_recommendations(&self, _ticker: &str) -> anyhow::Result<DataTable> {
            anyhow::ensure!(!self.fail_recommendations, "HTTP 500");
            let mut t = DataTable::new("", vec!["period".into(), "buy".into()]);
            for i in 0..8 {
                t.push_row(i.to_string(), vec![format!("-{i}m"), "20".into()]);
            }
            Ok(t)
        }

        async fn fetch_quarterly_statement(
            &self,
            _ticker: &str,
            kind: StatementKind,
        ) -> anyhow::Result<DataTable> {
            let columns = vec!["2025-06-30".into(), "2025-03-31".into(), "2024-12-31".into()];
            let mut t = DataTable::new("", columns);
            if !self.empty_statements {
                t.push_row(format!("{}_line", kind.key()), vec!["1".into(), "2".into(), "3".into()]);
            }
            Ok(t)
        }
    }

    #[derive(Default)]
    struct EchoSectionsLlm {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmClient for EchoSectionsLlm {
        fn provider(&self) -> Provider {
            Provider::Groq
        }

        async fn complete(
            &self,
            _api_key: &str,
            request: &ChatCompletionRequest,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(request.user.contains("Report Requirements"), "unexpected prompt");
            Ok(REPORT_SECTIONS
                .iter()
                .map(|s| format!("## {s}\nBody."))
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
    }

    fn analyzer(
        market: Arc<FakeMarket>,
        llm: Arc<EchoSectionsLlm>,
        api_key: Option<&str>,
    ) -> StockAnalyzer {
        StockAnalyzer::new(
            MarketDataClient::new(market),
            Arc::new(PlaceholderWebContext),
            ReportGenerator::new(api_key.map(str::to_string), "test-model", llm),
        )
    }

    #[tokio::test]
    async fn full_pipeline_for_aapl() {
        let market = Arc::new(FakeMarket::with_bars(252));
        let llm = Arc::new(EchoSectionsLlm::default());
        let a = analyzer(market.clone(), llm.clone(), Some("gsk_test"));

        let analysis = a.analyze("AAPL").await.unwrap();
        let snap = &analysis.snapshot;
        assert_eq!(snap.ticker, "AAPL");
        assert_eq!(snap.company_name, "AAPL Corp");
        assert_eq!(snap.price_history_1y.len(), 252);
        assert_eq!(snap.brief_info.keys().collect::<Vec<_>>(), BRIEF_INFO_KEYS.to_vec());

        let fin = &snap.financials_summary;
        for (text, kind) in [
            (&fin.income_statement_quarterly, StatementKind::Income),
            (&fin.balance_sheet_quarterly, StatementKind::BalanceSheet),
            (&fin.cash_flow_quarterly, StatementKind::CashFlow),
        ] {
            assert!(text.contains(&format!("{}_line", kind.key())));
            assert!(text.contains("2025-03-31"));
            assert!(!text.contains("2024-12-31"));
        }

        assert!(snap.full_info_dump["companyOfficers"].is_string());
        assert!(snap.recommendations.contains("-3m"));
        assert!(snap.recommendations.contains("-7m"));
        assert!(!snap.recommendations.contains("-2m"));
        assert_eq!(analysis.web_context, vec![WEB_CONTEXT_PLACEHOLDER.to_string()]);
        for section in REPORT_SECTIONS {
            assert!(analysis.report.contains(section));
        }
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn degraded_recommendations_still_reach_generation() {
        let market = Arc::new(FakeMarket {
            fail_recommendations: true,
            ..FakeMarket::with_bars(30)
        });
        let llm = Arc::new(EchoSectionsLlm::default());
        let a = analyzer(market, llm.clone(), Some("gsk_test"));

        let analysis = a.analyze("XXXX").await.unwrap();
        assert_eq!(analysis.snapshot.recommendations, SUPPLEMENT_UNAVAILABLE);
        assert_ne!(analysis.snapshot.major_holders, SUPPLEMENT_UNAVAILABLE);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_supplements_use_their_sentinels() {
        let market = Arc::new(FakeMarket {
            empty_statements: true,
            ..FakeMarket::with_bars(0)
        });
        let client = MarketDataClient::new(market);
        let snap = client.fetch("EMPT").await.unwrap();
        assert!(snap.price_history_1y.is_empty());
        assert_eq!(snap.financials_summary.income_statement_quarterly, STATEMENT_EMPTY);
        assert_eq!(snap.financials_summary.cash_flow_quarterly, STATEMENT_EMPTY);
        assert_ne!(snap.recommendations, NO_RECOMMENDATIONS);
    }

    #[tokio::test]
    async fn fatal_profile_failure_stops_the_pipeline() {
        let market = Arc::new(FakeMarket {
            fail_info: true,
            ..FakeMarket::with_bars(10)
        });
        let llm = Arc::new(EchoSectionsLlm::default());
        let a = analyzer(market.clone(), llm.clone(), Some("gsk_test"));

        let err = a.analyze("ZZZZ").await.unwrap_err();
        assert_eq!(err.stage, "info");
        assert_eq!(err.ticker, "ZZZZ");
        assert!(err.detail.contains("Quote not found"));
        assert_eq!(market.history_calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);

        assert!(a.prepare("ZZZZ").await.is_err());
    }

    #[tokio::test]
    async fn history_failure_is_fatal() {
        let market = Arc::new(FakeMarket {
            fail_history: true,
            ..FakeMarket::with_bars(10)
        });
        let llm = Arc::new(EchoSectionsLlm::default());
        let a = analyzer(market.clone(), llm.clone(), Some("gsk_test"));

        let err = a.prepare("DLST").await.unwrap_err();
        assert_eq!(err.stage, "history");
        assert!(err.detail.contains("delisted"));
        assert_eq!(market.info_calls.load(Ordering::SeqCst), 1);

        let err = a.analyze("DLST").await.unwrap_err();
        assert_eq!(err.stage, "history");
        assert!(err.user_message().contains("DLST"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credential_yields_notice_without_calls() {
        let market = Arc::new(FakeMarket::with_bars(5));
        let llm = Arc::new(EchoSectionsLlm::default());
        let a = analyzer(market, llm.clone(), None);
        assert_eq!(a.credential_status(), CredentialStatus::Missing);

        let analysis = a.analyze("AAPL").await.unwrap();
        assert_eq!(analysis.report, NOT_CONFIGURED_MESSAGE);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prepared_prompt_carries_snapshot_data() {
        let market = Arc::new(FakeMarket::with_bars(252));
        let a = analyzer(market, Arc::new(EchoSectionsLlm::default()), None);

        let prepared = a.prepare("AAPL").await.unwrap();
        assert!(prepared.prompt.contains("AAPL Corp (AAPL)"));
        assert!(prepared.prompt.contains(WEB_CONTEXT_PLACEHOLDER));
        assert!(!prepared.prompt.contains("A. Person"));
    }
}
