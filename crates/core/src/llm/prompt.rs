use crate::domain::snapshot::{history_table, StockSnapshot};

pub const SUMMARY_CHAR_LIMIT: usize = 1000;
pub const RECENT_PRICE_ROWS: usize = 5;

pub const REPORT_SECTIONS: [&str; 6] = [
    "Company Overview",
    "Financial Analysis",
    "Market Sentiment and News",
    "Risk Assessment",
    "Opportunities and Growth Drivers",
    "Investment Outlook Summary",
];

pub const REQUIREMENTS_HEADING: &str = "**Report Requirements";

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn stock_data_block(snapshot: &StockSnapshot, ticker: &str) -> String {
    let recent = snapshot.recent_history(RECENT_PRICE_ROWS);
    let price_trend = if recent.is_empty() {
        "Price history not available.".to_string()
    } else {
        history_table(recent).render()
    };
    let fin = &snapshot.financials_summary;

    format!(
        "Company: {company} ({ticker})\n\
Sector: {sector}\n\
Industry: {industry}\n\
Business Summary: {summary}\n\n\
Key Financial Info:\n{info}\n\n\
Recent Price Trend (Last {rows} days of 1-year history):\n{price_trend}\n\n\
Major Holders:\n{holders}\n\n\
Analyst Recommendations (Recent):\n{recommendations}\n\n\
Quarterly Financials Summary:\n\
Income Statement (Recent 2 Qtrs):\n{income}\n\n\
Balance Sheet (Recent 2 Qtrs):\n{balance}\n\n\
Cash Flow (Recent 2 Qtrs):\n{cash_flow}",
        company = snapshot.company_name,
        sector = snapshot.sector,
        industry = snapshot.industry,
        summary = truncate_chars(&snapshot.business_summary, SUMMARY_CHAR_LIMIT),
        info = snapshot.brief_info.render(),
        rows = RECENT_PRICE_ROWS,
        holders = snapshot.major_holders,
        recommendations = snapshot.recommendations,
        income = fin.income_statement_quarterly,
        balance = fin.balance_sheet_quarterly,
        cash_flow = fin.cash_flow_quarterly,
    )
}

fn requirements_block() -> String {
    [
        "**Report Requirements (structure the report with these sections, in Markdown):**",
        "",
        "1.  **Company Overview:**",
        "    * Brief description of the company, its core business, and market position.",
        "    * Mention its sector and industry.",
        "",
        "2.  **Financial Analysis:**",
        "    * Comment on the key financial indicators provided (P/E ratios, market cap, dividend yield if available).",
        "    * Analyze the recent price trend from the 1-year history snapshot.",
        "    * Discuss insights from the quarterly statements (income, balance sheet, cash flow).",
        "    * Mention any insights from major holders and analyst recommendations.",
        "",
        "3.  **Market Sentiment and News Analysis:**",
        "    * Synthesize insights from the web search snippets.",
        "    * Discuss recent news, events, or market sentiment that could impact the stock.",
        "    * If web snippets are limited, acknowledge this and focus on general market conditions for the sector.",
        "",
        "4.  **Risk Assessment:**",
        "    * Identify potential risks of investing in this stock (industry risks, company-specific risks, market volatility).",
        "",
        "5.  **Opportunities and Growth Drivers:**",
        "    * Identify potential opportunities or growth drivers for the company.",
        "",
        "6.  **Investment Outlook Summary:**",
        "    * Provide a balanced summary of the findings.",
        "    * Conclude with a general outlook for the stock.",
        "    * **Important: Do NOT provide direct financial advice (e.g., \"buy\", \"sell\", \"hold\"). Instead, offer an objective summary of potential upsides and downsides based on the data.**",
        "",
        "Generate a detailed and well-structured report in Markdown.",
        "If some data is \"Not available\" or \"Error fetching\", acknowledge it and proceed with the available information.",
    ]
    .join("\n")
}

/// `full_info_dump` never reaches the model.
pub fn build(
    snapshot: &StockSnapshot,
    web_snippets: &[String],
    company_name: &str,
    ticker: &str,
) -> String {
    let web = if web_snippets.is_empty() {
        "- No web search results available.".to_string()
    } else {
        web_snippets
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an expert financial analyst. Your task is to generate a comprehensive investment report for {company_name} ({ticker}).\n\
Use the provided stock data and recent web search information.\n\n\
**Provided Stock Data:**\n{data}\n\n\
**Recent Web Search Snippets/Information:**\n{web}\n\n\
{requirements}\n",
        data = stock_data_block(snapshot, ticker),
        requirements = requirements_block(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::{
        BriefInfo, FinancialsSummary, PriceBar, STATEMENT_ERROR, SUPPLEMENT_UNAVAILABLE,
    };
    use chrono::{Duration, NaiveDate};
    use serde_json::{json, Map};

    fn snapshot(summary: String, bars: usize) -> StockSnapshot {
        let info: Map<_, _> = json!({"symbol": "AAPL", "longName": "Apple Inc.", "trailingPE": 35.2})
            .as_object()
            .cloned()
            .unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let price_history_1y = (0..bars)
            .map(|i| PriceBar {
                date: start + Duration::days(i as i64),
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volume: 1_000 + i as u64,
            })
            .collect();

        StockSnapshot {
            ticker: "AAPL".into(),
            company_name: "Apple Inc.".into(),
            sector: "Technology".into(),
            industry: "Consumer Electronics".into(),
            business_summary: summary,
            brief_info: BriefInfo::from_info(&info),
            full_info_dump: info,
            price_history_1y,
            major_holders: SUPPLEMENT_UNAVAILABLE.into(),
            recommendations: "period strongBuy buy hold sell".into(),
            financials_summary: FinancialsSummary {
                income_statement_quarterly: "totalRevenue 94".into(),
                balance_sheet_quarterly: STATEMENT_ERROR.into(),
                cash_flow_quarterly: "Not available".into(),
            },
        }
    }

    fn build_default(snap: &StockSnapshot) -> String {
        build(snap, &["snippet one".to_string()], "Apple Inc.", "AAPL")
    }

    #[test]
    fn contains_all_section_headers() {
        let prompt = build_default(&snapshot("Designs phones.".into(), 10));
        for section in REPORT_SECTIONS {
            assert!(prompt.contains(section), "missing section {section}");
        }
    }

    #[test]
    fn sections_follow_data_in_fixed_order() {
        let prompt = build_default(&snapshot("Designs phones.".into(), 10));
        let order = [
            "Company: Apple Inc. (AAPL)",
            "Key Financial Info:",
            "Recent Price Trend",
            "Major Holders:",
            "Analyst Recommendations (Recent):",
            "Income Statement (Recent 2 Qtrs):",
            "- snippet one",
            REQUIREMENTS_HEADING,
        ];
        let positions: Vec<_> = order.iter().map(|m| prompt.find(m).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let mut last = prompt.find(REQUIREMENTS_HEADING).unwrap();
        for section in REPORT_SECTIONS {
            let at = prompt[last..].find(section).unwrap() + last;
            assert!(at >= last);
            last = at;
        }
    }

    fn standalone_word_positions(text: &str, word: &str) -> Vec<usize> {
        let lower = text.to_lowercase();
        let bytes = lower.as_bytes();
        lower
            .match_indices(word)
            .map(|(i, _)| i)
            .filter(|&i| {
                let before = i.checked_sub(1).map(|j| bytes[j]);
                let after = bytes.get(i + word.len()).copied();
                !before.is_some_and(|b| b.is_ascii_alphanumeric())
                    && !after.is_some_and(|b| b.is_ascii_alphanumeric())
            })
            .collect()
    }

    #[test]
    fn advice_words_only_appear_quoted_in_instructions() {
        let prompt = build_default(&snapshot("Designs phones.".into(), 10));
        let instructions = &prompt[prompt.find(REQUIREMENTS_HEADING).unwrap()..];
        let bytes = instructions.as_bytes();
        let mut seen = 0;
        for word in ["buy", "sell", "hold"] {
            for i in standalone_word_positions(instructions, word) {
                seen += 1;
                assert_eq!(bytes[i - 1], b'"', "unquoted {word:?} in instructions");
            }
        }
        assert_eq!(seen, 3);
        assert!(instructions.contains("Do NOT provide direct financial advice"));
    }

    #[test]
    fn long_summary_is_truncated_to_limit() {
        let summary = "x".repeat(5000);
        let prompt = build_default(&snapshot(summary, 10));
        assert!(prompt.contains(&"x".repeat(SUMMARY_CHAR_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(SUMMARY_CHAR_LIMIT + 1)));
    }

    #[test]
    fn truncation_counts_characters() {
        let text = "é".repeat(1200);
        let out = truncate_chars(&text, SUMMARY_CHAR_LIMIT);
        assert_eq!(out.chars().count(), SUMMARY_CHAR_LIMIT + 3);
        assert_eq!(truncate_chars("short", SUMMARY_CHAR_LIMIT), "short");
    }

    #[test]
    fn only_last_five_bars_are_rendered() {
        let prompt = build_default(&snapshot("s".into(), 252));
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..252 {
            let date = (start + Duration::days(i)).to_string();
            assert_eq!(prompt.contains(&date), i >= 247, "bar {date}");
        }
    }

    #[test]
    fn sentinels_pass_through() {
        let prompt = build_default(&snapshot("s".into(), 0));
        assert!(prompt.contains("Price history not available."));
        assert!(prompt.contains(SUPPLEMENT_UNAVAILABLE));
        assert!(prompt.contains(STATEMENT_ERROR));
    }

    #[test]
    fn empty_web_context_is_stated() {
        let prompt = build(&snapshot("s".into(), 3), &[], "Apple Inc.", "AAPL");
        assert!(prompt.contains("- No web search results available."));
    }
}
