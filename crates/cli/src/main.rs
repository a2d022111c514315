use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockscope_core::config::Settings;
use stockscope_core::domain::snapshot::{history_table, StockSnapshot};
use stockscope_core::pipeline::StockAnalyzer;

const RECENT_ROWS: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "stockscope")]
struct Args {
    /// Ticker symbol to analyze.
    #[arg(long, default_value = "AAPL")]
    ticker: String,

    /// Print the report prompt instead of calling the LLM.
    #[arg(long)]
    prompt_only: bool,

    /// Also print the sanitized provider profile as JSON.
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let ticker = args.ticker.trim();
    anyhow::ensure!(!ticker.is_empty(), "Please enter a stock ticker symbol.");

    let analyzer = StockAnalyzer::from_settings(&settings)?;
    if let Some(warning) = analyzer.credential_status().warning() {
        tracing::warn!("{warning}");
    }

    let prepared = match analyzer.prepare(ticker).await {
        Ok(prepared) => prepared,
        Err(err) => {
            let message = err.user_message();
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%ticker, error = %err, "analysis aborted");
            anyhow::bail!(message);
        }
    };

    print_snapshot(&prepared.snapshot, &prepared.web_context);

    if args.raw {
        let raw = serde_json::to_string_pretty(&prepared.snapshot.full_info_dump)
            .context("serialize info dump failed")?;
        println!("\n## Raw Data\n{raw}");
    }

    if args.prompt_only {
        println!("\n## Prompt\n{}", prepared.prompt);
        return Ok(());
    }

    let report = analyzer.generate(&prepared.prompt).await;
    println!("\n## AI Generated Report\n{report}");

    Ok(())
}

fn print_snapshot(snapshot: &StockSnapshot, web_context: &[String]) {
    println!(
        "# Analysis for {} ({})",
        snapshot.company_name, snapshot.ticker
    );
    println!(
        "Sector: {} | Industry: {}\n",
        snapshot.sector, snapshot.industry
    );
    println!("{}\n", snapshot.business_summary);
    println!("## Key Info\n{}\n", snapshot.brief_info.render());

    let recent = snapshot.recent_history(RECENT_ROWS);
    if recent.is_empty() {
        println!("## Price History\nPrice history not available.\n");
    } else {
        println!(
            "## Price History ({} bars, last {})\n{}\n",
            snapshot.price_history_1y.len(),
            recent.len(),
            history_table(recent).render()
        );
    }

    let fin = &snapshot.financials_summary;
    println!("## Major Holders\n{}\n", snapshot.major_holders);
    println!("## Analyst Recommendations\n{}\n", snapshot.recommendations);
    println!("## Income Statement (Quarterly)\n{}\n", fin.income_statement_quarterly);
    println!("## Balance Sheet (Quarterly)\n{}\n", fin.balance_sheet_quarterly);
    println!("## Cash Flow (Quarterly)\n{}\n", fin.cash_flow_quarterly);

    println!("## Web Context");
    for snippet in web_context {
        println!("- {snippet}");
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
