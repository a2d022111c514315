use crate::config::Settings;
use crate::domain::snapshot::PriceBar;
use crate::domain::table::{cell_text, DataTable};
use crate::ingest::provider::{MarketDataSource, StatementKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const REFERER_URL: &str = "https://finance.yahoo.com/";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const INFO_MODULES: [&str; 5] = [
    "assetProfile",
    "price",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
];

const STATEMENT_LOOKBACK_DAYS: i64 = 730;

const INCOME_ITEMS: &[&str] = &[
    "TotalRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "ResearchAndDevelopment",
    "SellingGeneralAndAdministration",
    "OperatingExpense",
    "OperatingIncome",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "EBITDA",
    "BasicEPS",
    "DilutedEPS",
];

const BALANCE_SHEET_ITEMS: &[&str] = &[
    "TotalAssets",
    "CurrentAssets",
    "CashAndCashEquivalents",
    "TotalLiabilitiesNetMinorityInterest",
    "CurrentLiabilities",
    "LongTermDebt",
    "TotalDebt",
    "StockholdersEquity",
    "RetainedEarnings",
    "WorkingCapital",
];

const CASH_FLOW_ITEMS: &[&str] = &[
    "OperatingCashFlow",
    "InvestingCashFlow",
    "FinancingCashFlow",
    "CapitalExpenditure",
    "FreeCashFlow",
    "RepurchaseOfCapitalStock",
    "CashDividendsPaid",
    "EndCashPosition",
];

// The crumb is cached until Yahoo answers 401.
#[derive(Debug)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
    base_url: String,
    cookie_url: String,
    crumb: tokio::sync::Mutex<Option<String>>,
}

impl YahooFinanceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT);
        if let Some(secs) = settings.yahoo_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("failed to build Yahoo Finance http client")?;

        Ok(Self {
            http,
            base_url: settings.yahoo_base_url.trim_end_matches('/').to_string(),
            cookie_url: settings.yahoo_cookie_url.clone(),
            crumb: tokio::sync::Mutex::new(None),
        })
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
        headers
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid YAHOO_BASE_URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("YAHOO_BASE_URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.lock().await.clone() {
            return Ok(crumb);
        }

        let crumb = self.fetch_crumb().await?;
        *self.crumb.lock().await = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // The cookie host answers 404 but sets the session cookie we need.
        self.http
            .get(&self.cookie_url)
            .headers(Self::headers())
            .send()
            .await
            .context("Yahoo cookie request failed")?;

        let url = self.endpoint(&["v1", "test", "getcrumb"])?;
        let res = self
            .http
            .get(url)
            .headers(Self::headers())
            .send()
            .await
            .context("Yahoo crumb request failed")?;
        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read Yahoo crumb response")?;
        let crumb = body.trim();

        if !status.is_success() {
            anyhow::bail!("Yahoo crumb HTTP {status}: {crumb}");
        }
        anyhow::ensure!(
            !crumb.is_empty() && crumb.len() < 100 && !crumb.contains(' ') && !crumb.contains('<'),
            "Yahoo returned an unusable crumb: {crumb}"
        );
        Ok(crumb.to_string())
    }

    async fn get_json(&self, url: Url, query: &[(&str, &str)]) -> Result<Value> {
        let res = self
            .http
            .get(url.clone())
            .headers(Self::headers())
            .query(query)
            .send()
            .await
            .with_context(|| format!("Yahoo request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Yahoo response")?;

        if status == StatusCode::UNAUTHORIZED {
            self.crumb.lock().await.take();
        }
        if !status.is_success() {
            anyhow::bail!("Yahoo HTTP {status}: {text}");
        }
        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Yahoo response is not valid JSON: {text}"))
    }

    async fn quote_summary(&self, ticker: &str, modules: &[&str]) -> Result<Map<String, Value>> {
        let crumb = self.crumb().await?;
        let modules = modules.join(",");
        let url = self.endpoint(&["v10", "finance", "quoteSummary", ticker])?;
        let raw = self
            .get_json(url, &[("modules", modules.as_str()), ("crumb", crumb.as_str())])
            .await?;
        parse_quote_summary(raw)
    }
}

#[async_trait::async_trait]
impl MarketDataSource for YahooFinanceClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_info(&self, ticker: &str) -> Result<Map<String, Value>> {
        let result = self.quote_summary(ticker, &INFO_MODULES).await?;
        let info = flatten_modules(&result, &INFO_MODULES);
        anyhow::ensure!(!info.is_empty(), "Yahoo returned no profile fields for {ticker}");
        Ok(info)
    }

    async fn fetch_history_1y(&self, ticker: &str) -> Result<Vec<PriceBar>> {
        let url = self.endpoint(&["v8", "finance", "chart", ticker])?;
        let raw = self
            .get_json(url, &[("range", "1y"), ("interval", "1d")])
            .await?;
        parse_chart(raw)
    }

    async fn fetch_major_holders(&self, ticker: &str) -> Result<DataTable> {
        let result = self.quote_summary(ticker, &["majorHoldersBreakdown"]).await?;
        Ok(major_holders_table(&result))
    }

    async fn fetch_recommendations(&self, ticker: &str) -> Result<DataTable> {
        let result = self.quote_summary(ticker, &["recommendationTrend"]).await?;
        Ok(recommendation_table(&result))
    }

    async fn fetch_quarterly_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
    ) -> Result<DataTable> {
        let crumb = self.crumb().await?;
        let types = statement_items(kind)
            .iter()
            .map(|item| format!("quarterly{item}"))
            .collect::<Vec<_>>()
            .join(",");
        let period2 = Utc::now().timestamp();
        let period1 = period2 - STATEMENT_LOOKBACK_DAYS * 86_400;
        let (period1, period2) = (period1.to_string(), period2.to_string());

        let url = self.endpoint(&[
            "ws",
            "fundamentals-timeseries",
            "v1",
            "finance",
            "timeseries",
            ticker,
        ])?;
        let raw = self
            .get_json(
                url,
                &[
                    ("symbol", ticker),
                    ("type", types.as_str()),
                    ("period1", period1.as_str()),
                    ("period2", period2.as_str()),
                    ("crumb", crumb.as_str()),
                ],
            )
            .await?;
        statement_table(raw, kind)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: ResultList<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesEnvelope {
    timeseries: ResultList<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ResultList<ChartResult>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ResultList<T> {
    #[serde(default)]
    result: Option<Vec<T>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn api_error(error: &Option<Value>) -> Option<String> {
    match error {
        None | Some(Value::Null) => None,
        Some(Value::Object(obj)) => Some(
            obj.get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        Some(other) => Some(other.to_string()),
    }
}

fn parse_quote_summary(raw: Value) -> Result<Map<String, Value>> {
    let envelope = serde_json::from_value::<QuoteSummaryEnvelope>(raw)
        .context("failed to decode Yahoo quoteSummary response")?;
    if let Some(error) = api_error(&envelope.quote_summary.error) {
        anyhow::bail!("Yahoo quoteSummary error: {error}");
    }
    envelope
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .context("Yahoo quoteSummary returned no result")
}

fn unwrap_raw(value: &Value) -> Value {
    match value {
        Value::Object(obj) if obj.contains_key("raw") => {
            obj.get("raw").cloned().unwrap_or(Value::Null)
        }
        Value::Object(obj) if obj.keys().all(|k| k == "fmt" || k == "longFmt") => {
            obj.get("fmt").cloned().unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

// Earlier modules win on key clashes.
fn flatten_modules(result: &Map<String, Value>, modules: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for module in modules {
        let Some(Value::Object(fields)) = result.get(*module) else {
            continue;
        };
        for (key, value) in fields {
            if key == "maxAge" || out.contains_key(key) {
                continue;
            }
            out.insert(key.clone(), unwrap_raw(value));
        }
    }
    out
}

fn parse_chart(raw: Value) -> Result<Vec<PriceBar>> {
    let envelope =
        serde_json::from_value::<ChartEnvelope>(raw).context("failed to decode Yahoo chart response")?;
    if let Some(error) = api_error(&envelope.chart.error) {
        anyhow::bail!("Yahoo chart error: {error}");
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let offset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.into_iter().enumerate() {
        let (Some(Some(open)), Some(Some(high)), Some(Some(low)), Some(Some(close))) = (
            quote.open.get(i),
            quote.high.get(i),
            quote.low.get(i),
            quote.close.get(i),
        ) else {
            continue;
        };
        let date = DateTime::from_timestamp(ts + offset, 0)
            .with_context(|| format!("invalid chart timestamp {ts}"))?
            .date_naive();
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0).max(0.0) as u64;

        bars.push(PriceBar {
            date,
            open: *open,
            high: *high,
            low: *low,
            close: *close,
            volume,
        });
    }
    Ok(bars)
}

fn major_holders_table(result: &Map<String, Value>) -> DataTable {
    let mut table = DataTable::new("Breakdown", vec!["Value".to_string()]);
    let Some(Value::Object(fields)) = result.get("majorHoldersBreakdown") else {
        return table;
    };
    for key in [
        "insidersPercentHeld",
        "institutionsPercentHeld",
        "institutionsFloatPercentHeld",
        "institutionsCount",
    ] {
        if let Some(value) = fields.get(key).map(unwrap_raw).filter(|v| !v.is_null()) {
            table.push_row(key, vec![cell_text(&value)]);
        }
    }
    table
}

fn recommendation_table(result: &Map<String, Value>) -> DataTable {
    let columns = ["period", "strongBuy", "buy", "hold", "sell", "strongSell"];
    let mut table = DataTable::new("", columns.iter().map(|c| c.to_string()).collect());
    let trend = result
        .get("recommendationTrend")
        .and_then(|m| m.get("trend"))
        .and_then(Value::as_array);

    // Yahoo lists the current month first.
    for (idx, row) in trend.into_iter().flatten().rev().enumerate() {
        let values = columns
            .iter()
            .map(|c| cell_text(&row.get(*c).map(unwrap_raw).unwrap_or(Value::Null)))
            .collect();
        table.push_row(idx.to_string(), values);
    }
    table
}

fn statement_items(kind: StatementKind) -> &'static [&'static str] {
    match kind {
        StatementKind::Income => INCOME_ITEMS,
        StatementKind::BalanceSheet => BALANCE_SHEET_ITEMS,
        StatementKind::CashFlow => CASH_FLOW_ITEMS,
    }
}

fn statement_table(raw: Value, kind: StatementKind) -> Result<DataTable> {
    let envelope = serde_json::from_value::<TimeseriesEnvelope>(raw)
        .context("failed to decode Yahoo timeseries response")?;
    if let Some(error) = api_error(&envelope.timeseries.error) {
        anyhow::bail!("Yahoo timeseries error: {error}");
    }

    let mut values: HashMap<String, HashMap<String, Value>> = HashMap::new();
    let mut dates = BTreeSet::new();
    for series in envelope.timeseries.result.unwrap_or_default() {
        let Some(series_type) = series
            .get("meta")
            .and_then(|m| m.get("type"))
            .and_then(|t| t.get(0))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let item = series_type.trim_start_matches("quarterly").to_string();
        let points = series
            .get(series_type)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object);
        for point in points {
            let (Some(date), Some(value)) = (
                point.get("asOfDate").and_then(Value::as_str),
                point.get("reportedValue").map(unwrap_raw),
            ) else {
                continue;
            };
            dates.insert(date.to_string());
            values
                .entry(item.clone())
                .or_default()
                .insert(date.to_string(), value);
        }
    }

    let columns: Vec<String> = dates.into_iter().rev().collect();
    let mut table = DataTable::new("", columns.clone());
    for item in statement_items(kind) {
        let Some(by_date) = values.get(*item) else {
            continue;
        };
        let row = columns
            .iter()
            .map(|date| cell_text(by_date.get(date).unwrap_or(&Value::Null)))
            .collect();
        table.push_row(*item, row);
    }
    Ok(table)
}
