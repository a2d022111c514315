use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stockscope_core::config::{CredentialStatus, Settings};
use stockscope_core::domain::snapshot::{BriefInfo, FinancialsSummary, PriceBar};
use stockscope_core::pipeline::{Analysis, StockAnalyzer};

const INDEX_HTML: &str = include_str!("../static/index.html");
const EMPTY_TICKER_MESSAGE: &str = "Please enter a stock ticker symbol.";
const PRICE_TAIL_ROWS: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let state = AppState::from_settings(&settings)?;
    if let Some(warning) = state.credential.warning() {
        tracing::warn!("{warning}");
    }

    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/config", get(get_config))
        .route("/analyze", post(analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<StockAnalyzer>,
    credential: CredentialStatus,
}

impl AppState {
    fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let analyzer = StockAnalyzer::from_settings(settings)?;
        Ok(Self {
            credential: analyzer.credential_status(),
            analyzer: Arc::new(analyzer),
        })
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ApiConfig {
    llm_configured: bool,
    warning: Option<&'static str>,
}

async fn get_config(State(state): State<AppState>) -> Json<ApiConfig> {
    Json(ApiConfig {
        llm_configured: state.credential.is_configured(),
        warning: state.credential.warning(),
    })
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    ticker: String,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ApiError { error })).into_response()
}

#[derive(Debug, Serialize)]
struct CompanyInfoView {
    company_name: String,
    sector: String,
    industry: String,
    business_summary: String,
    brief_info: BriefInfo,
}

#[derive(Debug, Serialize)]
struct ClosePoint {
    date: NaiveDate,
    close: f64,
}

#[derive(Debug, Serialize)]
struct PriceHistoryView {
    bars: usize,
    recent: Vec<PriceBar>,
    closes: Vec<ClosePoint>,
}

#[derive(Debug, Serialize)]
struct FinancialsView {
    major_holders: String,
    recommendations: String,
    statements: FinancialsSummary,
}

#[derive(Debug, Serialize)]
struct ApiAnalysis {
    request_id: Uuid,
    ticker: String,
    company_info: CompanyInfoView,
    price_history: PriceHistoryView,
    financials: FinancialsView,
    web_context: Vec<String>,
    report: String,
    info_dump: Map<String, Value>,
}

impl ApiAnalysis {
    fn new(request_id: Uuid, analysis: Analysis) -> Self {
        let Analysis {
            snapshot,
            web_context,
            report,
        } = analysis;

        let price_history = PriceHistoryView {
            bars: snapshot.price_history_1y.len(),
            recent: snapshot.recent_history(PRICE_TAIL_ROWS).to_vec(),
            closes: snapshot
                .price_history_1y
                .iter()
                .map(|bar| ClosePoint {
                    date: bar.date,
                    close: bar.close,
                })
                .collect(),
        };

        Self {
            request_id,
            ticker: snapshot.ticker,
            company_info: CompanyInfoView {
                company_name: snapshot.company_name,
                sector: snapshot.sector,
                industry: snapshot.industry,
                business_summary: snapshot.business_summary,
                brief_info: snapshot.brief_info,
            },
            price_history,
            financials: FinancialsView {
                major_holders: snapshot.major_holders,
                recommendations: snapshot.recommendations,
                statements: snapshot.financials_summary,
            },
            web_context,
            report,
            info_dump: snapshot.full_info_dump,
        }
    }
}

async fn analyze(State(state): State<AppState>, Json(req): Json<AnalyzeRequest>) -> Response {
    let ticker = req.ticker.trim();
    if ticker.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, EMPTY_TICKER_MESSAGE.to_string());
    }

    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, ticker, "analyze request");

    match state.analyzer.analyze(ticker).await {
        Ok(analysis) => Json(ApiAnalysis::new(request_id, analysis)).into_response(),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(err.clone()));
            tracing::error!(%request_id, error = %err, "analysis aborted");
            error_response(StatusCode::BAD_GATEWAY, err.user_message())
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
