pub mod fmp;
pub mod tradingview;
pub mod yahoo;

pub use fmp::FmpClient;
pub use tradingview::TradingViewClient;
pub use yahoo::YahooClient;

use std::time::Duration;

/// Default per-request timeout applied when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
