//! Analysis endpoints.
//!
//! `POST /api/analyze` serves one symbol; `POST /api/analyze_list` maps the
//! same handler over a list, reporting per-symbol errors inline instead of
//! failing the whole request.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use screener_core::{FusedRecord, ScoreBreakdown, ScreenerError};

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Deserialize)]
pub struct AnalyzeListRequest {
    pub tickers: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Serialize)]
pub struct SymbolAnalysis {
    pub record: FusedRecord,
    pub score: ScoreBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
}

/// One entry of a list analysis: either a full analysis or the error that
/// knocked the symbol out.
#[derive(Serialize)]
pub struct ListEntry {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FusedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/analyze_list", post(analyze_list))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<SymbolAnalysis>>, AppError> {
    match analyze_symbol(&state, &request.ticker, request.context.as_deref()).await {
        Ok(analysis) => Ok(Json(ApiResponse::success(analysis))),
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}

async fn analyze_list(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeListRequest>,
) -> Result<Json<ApiResponse<Vec<ListEntry>>>, AppError> {
    if request.tickers.is_empty() {
        return Ok(Json(ApiResponse::error(ScreenerError::EmptyBatch.to_string())));
    }

    let mut entries = Vec::with_capacity(request.tickers.len());
    for ticker in &request.tickers {
        let symbol = normalize(ticker);
        match analyze_symbol(&state, ticker, request.context.as_deref()).await {
            Ok(analysis) => entries.push(ListEntry {
                symbol,
                record: Some(analysis.record),
                score: Some(analysis.score),
                ai_analysis: analysis.ai_analysis,
                error: None,
            }),
            Err(e) => entries.push(ListEntry {
                symbol,
                record: None,
                score: None,
                ai_analysis: None,
                error: Some(e.to_string()),
            }),
        }
    }
    Ok(Json(ApiResponse::success(entries)))
}

async fn analyze_symbol(
    state: &AppState,
    ticker: &str,
    context: Option<&str>,
) -> Result<SymbolAnalysis, ScreenerError> {
    let symbol = normalize(ticker);
    if symbol.is_empty() {
        return Err(ScreenerError::SymbolUnavailable(ticker.to_string()));
    }

    let record = state.resolver.fuse(&symbol).await?;
    let score = state.engine.score(&record, None);

    // Narrative failures degrade to a numeric-only response.
    let ai_analysis = match &state.summarizer {
        None => None,
        Some(summarizer) => match summarizer.summarize(&record, Some(&score), context).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "narrative generation failed");
                None
            }
        },
    };

    Ok(SymbolAnalysis {
        record,
        score,
        ai_analysis,
    })
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
