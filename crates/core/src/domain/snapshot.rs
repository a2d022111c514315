use crate::domain::table::{cell_text, DataTable};
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const NOT_AVAILABLE: &str = "N/A";
pub const SUPPLEMENT_UNAVAILABLE: &str = "Not available or error fetching.";
pub const NO_RECOMMENDATIONS: &str = "No recommendations data available.";
pub const STATEMENT_EMPTY: &str = "Not available";
pub const STATEMENT_ERROR: &str = "Error fetching.";

/// Profile fields surfaced to the user and to the prompt, in display order.
pub const BRIEF_INFO_KEYS: [&str; 20] = [
    "symbol",
    "longName",
    "sector",
    "industry",
    "country",
    "website",
    "marketCap",
    "enterpriseValue",
    "trailingPE",
    "forwardPE",
    "dividendYield",
    "beta",
    "52WeekChange",
    "shortRatio",
    "currentPrice",
    "targetHighPrice",
    "targetLowPrice",
    "targetMeanPrice",
    "recommendationKey",
    "numberOfAnalystOpinions",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Missing or null values read `"N/A"`.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefInfo {
    fields: Vec<(&'static str, Value)>,
}

impl BriefInfo {
    pub fn from_info(info: &Map<String, Value>) -> Self {
        let fields = BRIEF_INFO_KEYS
            .iter()
            .map(|&key| {
                let value = match info.get(key) {
                    None | Some(Value::Null) => Value::String(NOT_AVAILABLE.to_string()),
                    Some(v) => v.clone(),
                };
                (key, value)
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    pub fn render(&self) -> String {
        let width = self.keys().map(str::len).max().unwrap_or(0);
        self.fields
            .iter()
            .map(|(k, v)| format!("{k:<width$}    {}", cell_text(v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Serialize for BriefInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialsSummary {
    pub income_statement_quarterly: String,
    pub balance_sheet_quarterly: String,
    pub cash_flow_quarterly: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockSnapshot {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub business_summary: String,
    pub brief_info: BriefInfo,
    pub full_info_dump: Map<String, Value>,
    pub price_history_1y: Vec<PriceBar>,
    pub major_holders: String,
    pub recommendations: String,
    pub financials_summary: FinancialsSummary,
}

impl StockSnapshot {
    pub fn recent_history(&self, n: usize) -> &[PriceBar] {
        let skip = self.price_history_1y.len().saturating_sub(n);
        &self.price_history_1y[skip..]
    }
}

pub fn history_table(bars: &[PriceBar]) -> DataTable {
    let mut table = DataTable::new(
        "Date",
        ["Open", "High", "Low", "Close", "Volume"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    for bar in bars {
        table.push_row(
            bar.date.to_string(),
            vec![
                format!("{:.2}", bar.open),
                format!("{:.2}", bar.high),
                format!("{:.2}", bar.low),
                format!("{:.2}", bar.close),
                bar.volume.to_string(),
            ],
        );
    }
    table
}

pub fn info_text(info: &Map<String, Value>, key: &str) -> String {
    match info.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) => NOT_AVAILABLE.to_string(),
        Some(other) => other.to_string(),
    }
}
