//! Technical-indicator provider (TradingView scanner).
//!
//! Supplies RSI, MACD and the aggregate recommendation label; it never
//! contributes identity or valuation fields.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use screener_core::{FetchOutcome, FieldPatch, ProviderAdapter, ProviderKind, ScreenerError};

const BASE_URL: &str = "https://scanner.tradingview.com";
const COLUMNS: [&str; 3] = ["RSI", "MACD.macd", "Recommend.All"];

#[derive(Clone)]
pub struct TradingViewClient {
    client: Client,
    base_url: String,
    /// Exchange prefix used in scanner ticker ids, e.g. `NASDAQ:AAPL`.
    exchange: String,
}

impl TradingViewClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: crate::build_http_client(timeout),
            base_url: BASE_URL.to_string(),
            exchange: "NASDAQ".to_string(),
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderAdapter for TradingViewClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TradingView
    }

    async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ScreenerError> {
        let url = format!("{}/america/scan", self.base_url);
        let payload = ScanRequest {
            symbols: ScanSymbols {
                tickers: vec![format!("{}:{}", self.exchange, symbol.to_uppercase())],
                query: ScanQuery { types: vec![] },
            },
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScreenerError::Provider(format!("tradingview request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ScreenerError::Provider(format!(
                "tradingview HTTP {}",
                response.status()
            )));
        }

        let scan: ScanResponse = response
            .json()
            .await
            .map_err(|e| ScreenerError::Provider(format!("tradingview parse error: {e}")))?;

        let Some(row) = scan.data.into_iter().next() else {
            return Ok(FetchOutcome::NoData);
        };

        Ok(FetchOutcome::Data(row_to_patch(&row.d)))
    }
}

fn row_to_patch(columns: &[Value]) -> FieldPatch {
    let num = |i: usize| columns.get(i).and_then(Value::as_f64);
    FieldPatch {
        rsi: num(0),
        macd: num(1),
        recommendation: num(2).map(recommend_label).map(str::to_string),
        ..Default::default()
    }
}

/// Map the scanner's `Recommend.All` rating in [-1, 1] to the label the
/// rest of the pipeline keys on.
fn recommend_label(score: f64) -> &'static str {
    if score >= 0.5 {
        "STRONG_BUY"
    } else if score > 0.1 {
        "BUY"
    } else if score >= -0.1 {
        "NEUTRAL"
    } else if score > -0.5 {
        "SELL"
    } else {
        "STRONG_SELL"
    }
}

#[derive(Debug, Serialize)]
struct ScanRequest {
    symbols: ScanSymbols,
    columns: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScanSymbols {
    tickers: Vec<String>,
    query: ScanQuery,
}

#[derive(Debug, Serialize)]
struct ScanQuery {
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    d: Vec<Value>,
}
