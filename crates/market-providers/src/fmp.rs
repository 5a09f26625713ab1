//! Fallback fundamentals provider (Financial Modeling Prep profile API).
//!
//! Consulted after Yahoo for valuation multiples Yahoo left empty.
//! Requires an API key; auth failures are hard provider failures, an empty
//! profile array is just "no data".

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use screener_core::{FetchOutcome, FieldPatch, ProviderAdapter, ProviderKind, ScreenerError};

const BASE_URL: &str = "https://financialmodelingprep.com";

#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl FmpClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            api_key,
            client: crate::build_http_client(timeout),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderAdapter for FmpClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fmp
    }

    async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ScreenerError> {
        let url = format!(
            "{}/api/v3/profile/{}",
            self.base_url,
            symbol.to_uppercase()
        );

        let response = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ScreenerError::Provider(format!("fmp request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ScreenerError::Provider(format!("fmp auth rejected ({status})")));
        }
        if status.as_u16() == 404 {
            return Ok(FetchOutcome::NoData);
        }
        if !status.is_success() {
            return Err(ScreenerError::Provider(format!("fmp HTTP {status}")));
        }

        let profiles: Vec<FmpProfile> = response
            .json()
            .await
            .map_err(|e| ScreenerError::Provider(format!("fmp parse error: {e}")))?;

        match profiles.into_iter().next() {
            Some(profile) => Ok(FetchOutcome::Data(profile.into_patch())),
            None => Ok(FetchOutcome::NoData),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FmpProfile {
    #[serde(rename = "companyName")]
    company_name: Option<String>,
    price: Option<f64>,
    #[serde(rename = "mktCap")]
    market_cap: Option<f64>,
    pe: Option<f64>,
    #[serde(rename = "priceToBook")]
    price_to_book: Option<f64>,
    #[serde(rename = "priceToSalesRatioTTM")]
    price_to_sales: Option<f64>,
    #[serde(rename = "pegRatio")]
    peg_ratio: Option<f64>,
    sector: Option<String>,
    industry: Option<String>,
}

impl FmpProfile {
    fn into_patch(self) -> FieldPatch {
        FieldPatch {
            name: self.company_name,
            sector: self.sector,
            industry: self.industry,
            price: self.price,
            market_cap: self.market_cap,
            pe: self.pe,
            pb: self.price_to_book,
            ps: self.price_to_sales,
            peg: self.peg_ratio,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_maps_to_patch() {
        let body = r#"[{
            "symbol": "PLX",
            "companyName": "Protalix BioTherapeutics",
            "price": 1.42,
            "mktCap": 105000000,
            "pe": null,
            "priceToBook": 8.3,
            "priceToSalesRatioTTM": 2.9,
            "pegRatio": 0.7,
            "sector": "Healthcare",
            "industry": "Biotechnology"
        }]"#;
        let profiles: Vec<FmpProfile> = serde_json::from_str(body).unwrap();
        let patch = profiles.into_iter().next().unwrap().into_patch();

        assert_eq!(patch.name.as_deref(), Some("Protalix BioTherapeutics"));
        assert_eq!(patch.price, Some(1.42));
        assert_eq!(patch.pe, None);
        assert_eq!(patch.pb, Some(8.3));
        assert_eq!(patch.peg, Some(0.7));
        assert_eq!(patch.sector.as_deref(), Some("Healthcare"));
    }

    #[test]
    fn empty_body_is_no_data() {
        let profiles: Vec<FmpProfile> = serde_json::from_str("[]").unwrap();
        assert!(profiles.is_empty());
    }
}
