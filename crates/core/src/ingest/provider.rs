use crate::domain::snapshot::{
    info_text, BriefInfo, FinancialsSummary, PriceBar, StockSnapshot, NOT_AVAILABLE,
    NO_RECOMMENDATIONS, STATEMENT_EMPTY, STATEMENT_ERROR, SUPPLEMENT_UNAVAILABLE,
};
use crate::domain::table::DataTable;
use crate::ingest::error::DataFetchError;
use crate::ingest::sanitize::sanitize;
use anyhow::Result;
use serde_json::{Map, Value};
use std::sync::Arc;

const RECOMMENDATION_ROWS: usize = 5;
const STATEMENT_COLUMNS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Income,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::Income,
        StatementKind::BalanceSheet,
        StatementKind::CashFlow,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StatementKind::Income => "income_statement_quarterly",
            StatementKind::BalanceSheet => "balance_sheet_quarterly",
            StatementKind::CashFlow => "cash_flow_quarterly",
        }
    }
}

/// Statements come back newest column first, recommendations oldest row first.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_info(&self, ticker: &str) -> Result<Map<String, Value>>;

    async fn fetch_history_1y(&self, ticker: &str) -> Result<Vec<PriceBar>>;

    async fn fetch_major_holders(&self, ticker: &str) -> Result<DataTable>;

    async fn fetch_recommendations(&self, ticker: &str) -> Result<DataTable>;

    async fn fetch_quarterly_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
    ) -> Result<DataTable>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Available(String),
    Degraded(&'static str),
}

impl FieldOutcome {
    pub fn into_text(self) -> String {
        match self {
            FieldOutcome::Available(text) => text,
            FieldOutcome::Degraded(sentinel) => sentinel.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct MarketDataClient {
    source: Arc<dyn MarketDataSource>,
}

impl MarketDataClient {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self { source }
    }

    pub async fn fetch(&self, ticker: &str) -> Result<StockSnapshot, DataFetchError> {
        let provider = self.source.provider_name();
        tracing::info!(ticker, provider, "fetching market data");

        let raw_info = self
            .source
            .fetch_info(ticker)
            .await
            .map_err(|err| DataFetchError::new(ticker, "info", &err))?;
        let info = sanitize(raw_info);

        let price_history_1y = self
            .source
            .fetch_history_1y(ticker)
            .await
            .map_err(|err| DataFetchError::new(ticker, "history", &err))?;

        let major_holders = self.major_holders(ticker).await.into_text();
        let recommendations = self.recommendations(ticker).await.into_text();
        let financials_summary = FinancialsSummary {
            income_statement_quarterly: self
                .statement(ticker, StatementKind::Income)
                .await
                .into_text(),
            balance_sheet_quarterly: self
                .statement(ticker, StatementKind::BalanceSheet)
                .await
                .into_text(),
            cash_flow_quarterly: self
                .statement(ticker, StatementKind::CashFlow)
                .await
                .into_text(),
        };

        let company_name = match info_text(&info, "longName") {
            name if name == NOT_AVAILABLE => ticker.to_string(),
            name => name,
        };

        tracing::info!(
            ticker,
            bars = price_history_1y.len(),
            info_fields = info.len(),
            "market data fetched"
        );

        Ok(StockSnapshot {
            ticker: ticker.to_string(),
            company_name,
            sector: info_text(&info, "sector"),
            industry: info_text(&info, "industry"),
            business_summary: info_text(&info, "longBusinessSummary"),
            brief_info: BriefInfo::from_info(&info),
            full_info_dump: info,
            price_history_1y,
            major_holders,
            recommendations,
            financials_summary,
        })
    }

    pub async fn major_holders(&self, ticker: &str) -> FieldOutcome {
        match self.source.fetch_major_holders(ticker).await {
            Ok(table) if !table.is_empty() => FieldOutcome::Available(table.render()),
            Ok(_) => {
                tracing::warn!(ticker, field = "major_holders", "no major holders data");
                FieldOutcome::Degraded(SUPPLEMENT_UNAVAILABLE)
            }
            Err(err) => {
                tracing::warn!(ticker, field = "major_holders", error = %err, "could not fetch major holders");
                FieldOutcome::Degraded(SUPPLEMENT_UNAVAILABLE)
            }
        }
    }

    pub async fn recommendations(&self, ticker: &str) -> FieldOutcome {
        match self.source.fetch_recommendations(ticker).await {
            Ok(table) if !table.is_empty() => {
                FieldOutcome::Available(table.tail(RECOMMENDATION_ROWS).render())
            }
            Ok(_) => FieldOutcome::Degraded(NO_RECOMMENDATIONS),
            Err(err) => {
                tracing::warn!(ticker, field = "recommendations", error = %err, "could not fetch recommendations");
                FieldOutcome::Degraded(SUPPLEMENT_UNAVAILABLE)
            }
        }
    }

    pub async fn statement(&self, ticker: &str, kind: StatementKind) -> FieldOutcome {
        match self.source.fetch_quarterly_statement(ticker, kind).await {
            Ok(table) if !table.is_empty() => {
                FieldOutcome::Available(table.leading_columns(STATEMENT_COLUMNS).render())
            }
            Ok(_) => FieldOutcome::Degraded(STATEMENT_EMPTY),
            Err(err) => {
                tracing::warn!(ticker, field = kind.key(), error = %err, "could not fetch financial statement");
                FieldOutcome::Degraded(STATEMENT_ERROR)
            }
        }
    }
}
