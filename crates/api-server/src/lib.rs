//! HTTP surface for on-demand single-symbol analysis.
//!
//! Each request runs the same fusion chain as the batch pipeline, scores
//! the result without sector context (one symbol is not a cross-section)
//! and optionally attaches an AI narrative.

pub mod routes;

use std::env;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use ai_client::{SummarizerClient, SummarizerConfig};
use fusion_engine::FusionResolver;
use market_providers::{FmpClient, TradingViewClient, YahooClient, DEFAULT_TIMEOUT};
use quant_scoring::ScoringEngine;
use screener_core::ProviderAdapter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<FusionResolver>,
    pub engine: Arc<ScoringEngine>,
    pub summarizer: Option<Arc<SummarizerClient>>,
}

/// Standard response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Catch-all handler error; anything that bubbles up unhandled becomes a
/// JSON 500.
pub struct AppError(anyhow::Error);

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(self.0.to_string())),
        )
            .into_response()
    }
}

/// The provider chain used for live requests, highest priority first.
/// The paid fallback joins only when its key is configured.
pub fn build_resolver() -> FusionResolver {
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> =
        vec![Arc::new(YahooClient::new(DEFAULT_TIMEOUT))];

    match env::var("FMP_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            adapters.push(Arc::new(FmpClient::new(key, DEFAULT_TIMEOUT)));
        }
        _ => {
            tracing::info!("FMP_API_KEY not set, fundamentals fallback disabled");
        }
    }

    adapters.push(Arc::new(TradingViewClient::new(DEFAULT_TIMEOUT)));
    FusionResolver::new(adapters, DEFAULT_TIMEOUT)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::analysis_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server() -> anyhow::Result<()> {
    let summarizer = match SummarizerConfig::from_env() {
        Ok(config) => Some(Arc::new(SummarizerClient::new(config))),
        Err(e) => {
            tracing::warn!(error = %e, "AI narrative disabled");
            None
        }
    };

    let state = AppState {
        resolver: Arc::new(build_resolver()),
        engine: Arc::new(ScoringEngine::default()),
        summarizer,
    };

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "analysis server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        AppState {
            resolver: Arc::new(FusionResolver::new(Vec::new(), Duration::from_secs(1))),
            engine: Arc::new(ScoringEngine::default()),
            summarizer: None,
        }
    }

    #[tokio::test]
    async fn health_route_responds() {
        let response = build_router(empty_state())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unresolvable_symbol_is_a_body_level_error() {
        let request = Request::post("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"ticker":"ZZZZ"}"#))
            .unwrap();
        let response = build_router(empty_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("ZZZZ"));
    }
}
