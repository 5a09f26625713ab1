//! Primary quote/fundamentals provider.
//!
//! Wraps the Yahoo quoteSummary endpoint and flattens its module structure
//! into one `FieldPatch`. Yahoo is the widest-coverage source, so it sits
//! first in the default priority chain.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use screener_core::{FetchOutcome, FieldPatch, ProviderAdapter, ProviderKind, ScreenerError};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const MODULES: &str = "price,summaryDetail,defaultKeyStatistics,assetProfile";

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: crate::build_http_client(timeout),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderAdapter for YahooClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Yahoo
    }

    async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ScreenerError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url,
            symbol.to_uppercase()
        );

        let response = self
            .client
            .get(&url)
            .query(&[("modules", MODULES)])
            .send()
            .await
            .map_err(|e| ScreenerError::Provider(format!("yahoo request failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(FetchOutcome::NoData);
        }
        if !response.status().is_success() {
            return Err(ScreenerError::Provider(format!(
                "yahoo HTTP {}",
                response.status()
            )));
        }

        let envelope: QuoteSummaryEnvelope = response
            .json()
            .await
            .map_err(|e| ScreenerError::Provider(format!("yahoo parse error: {e}")))?;

        let Some(result) = envelope
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        else {
            return Ok(FetchOutcome::NoData);
        };

        Ok(FetchOutcome::Data(result.into_patch()))
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(rename = "defaultKeyStatistics")]
    key_statistics: Option<KeyStatisticsModule>,
    #[serde(rename = "assetProfile")]
    profile: Option<AssetProfileModule>,
}

/// Yahoo wraps every numeric in `{ "raw": ..., "fmt": ... }`.
#[derive(Debug, Default, Deserialize)]
struct RawNum {
    raw: Option<f64>,
}

fn raw(v: &Option<RawNum>) -> Option<f64> {
    v.as_ref().and_then(|n| n.raw)
}

#[derive(Debug, Default, Deserialize)]
struct PriceModule {
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<RawNum>,
    #[serde(rename = "regularMarketOpen")]
    regular_market_open: Option<RawNum>,
    #[serde(rename = "regularMarketPreviousClose")]
    regular_market_previous_close: Option<RawNum>,
    #[serde(rename = "regularMarketDayHigh")]
    regular_market_day_high: Option<RawNum>,
    #[serde(rename = "regularMarketDayLow")]
    regular_market_day_low: Option<RawNum>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<RawNum>,
    #[serde(rename = "marketCap")]
    market_cap: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawNum>,
    #[serde(rename = "priceToSalesTrailing12Months")]
    price_to_sales: Option<RawNum>,
    #[serde(rename = "fiftyTwoWeekHigh")]
    fifty_two_week_high: Option<RawNum>,
    #[serde(rename = "fiftyTwoWeekLow")]
    fifty_two_week_low: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "priceToBook")]
    price_to_book: Option<RawNum>,
    #[serde(rename = "pegRatio")]
    peg_ratio: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
}

impl QuoteSummaryResult {
    fn into_patch(self) -> FieldPatch {
        let price = self.price.unwrap_or_default();
        let detail = self.summary_detail.unwrap_or_default();
        let stats = self.key_statistics.unwrap_or_default();
        let profile = self.profile.unwrap_or_default();

        FieldPatch {
            name: price.short_name,
            sector: profile.sector,
            industry: profile.industry,
            price: raw(&price.regular_market_price),
            open: raw(&price.regular_market_open),
            prev_close: raw(&price.regular_market_previous_close),
            day_high: raw(&price.regular_market_day_high),
            day_low: raw(&price.regular_market_day_low),
            week52_high: raw(&detail.fifty_two_week_high),
            week52_low: raw(&detail.fifty_two_week_low),
            volume: raw(&price.regular_market_volume),
            market_cap: raw(&price.market_cap),
            pe: raw(&detail.trailing_pe),
            pb: raw(&stats.price_to_book),
            ps: raw(&detail.price_to_sales),
            peg: raw(&stats.peg_ratio),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "quoteSummary": {
            "result": [{
                "price": {
                    "shortName": "Apple Inc.",
                    "regularMarketPrice": {"raw": 182.5, "fmt": "182.50"},
                    "regularMarketPreviousClose": {"raw": 180.0},
                    "regularMarketVolume": {"raw": 51230000},
                    "marketCap": {"raw": 2850000000000}
                },
                "summaryDetail": {
                    "trailingPE": {"raw": 29.4},
                    "priceToSalesTrailing12Months": {"raw": 7.6},
                    "fiftyTwoWeekHigh": {"raw": 199.6},
                    "fiftyTwoWeekLow": {"raw": 143.9}
                },
                "defaultKeyStatistics": {
                    "priceToBook": {"raw": 45.1},
                    "pegRatio": {"raw": 2.3}
                },
                "assetProfile": {
                    "sector": "Technology",
                    "industry": "Consumer Electronics"
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn quote_summary_maps_to_patch() {
        let envelope: QuoteSummaryEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let result = envelope.quote_summary.result.unwrap().remove(0);
        let patch = result.into_patch();

        assert_eq!(patch.name.as_deref(), Some("Apple Inc."));
        assert_eq!(patch.price, Some(182.5));
        assert_eq!(patch.prev_close, Some(180.0));
        assert_eq!(patch.pe, Some(29.4));
        assert_eq!(patch.pb, Some(45.1));
        assert_eq!(patch.ps, Some(7.6));
        assert_eq!(patch.peg, Some(2.3));
        assert_eq!(patch.sector.as_deref(), Some("Technology"));
        // Technicals are not Yahoo's concern.
        assert_eq!(patch.rsi, None);
        assert_eq!(patch.recommendation, None);
    }

    #[test]
    fn missing_modules_leave_fields_unset() {
        let body = r#"{"quoteSummary": {"result": [{"price": {"shortName": "Poet"}}]}}"#;
        let envelope: QuoteSummaryEnvelope = serde_json::from_str(body).unwrap();
        let patch = envelope.quote_summary.result.unwrap().remove(0).into_patch();
        assert_eq!(patch.name.as_deref(), Some("Poet"));
        assert_eq!(patch.pe, None);
        assert_eq!(patch.price, None);
    }

    #[test]
    fn null_result_means_no_data() {
        let body = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found"}}}"#;
        let envelope: QuoteSummaryEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.quote_summary.result.is_none());
    }
}
