//! Periodic batch runner.
//!
//! Every cycle fuses the configured symbol list, scores the batch and
//! replaces two CSV tables: the raw fused snapshot and the scored
//! analysis. Pass `--once` for a single cycle (cron-style usage).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use batch_orchestrator::{BatchOrchestrator, CsvSink, TabularSink};
use fusion_engine::FusionResolver;
use market_providers::{FmpClient, TradingViewClient, YahooClient, DEFAULT_TIMEOUT};
use quant_scoring::ScoringEngine;
use screener_core::ProviderAdapter;

const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "TSLA", "NVDA", "PLX", "POET"];
const DEFAULT_INTERVAL_MINUTES: u64 = 3;
const DEFAULT_SNAPSHOT_CSV: &str = "stock_data.csv";
const DEFAULT_OUTPUT_CSV: &str = "quant_analysis.csv";

struct PollerConfig {
    symbols: Vec<String>,
    interval: Duration,
    snapshot_path: String,
    output_path: String,
    run_once: bool,
}

impl PollerConfig {
    fn from_env() -> Self {
        let symbols = match env::var("SYMBOLS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        let minutes = env::var("POLL_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_INTERVAL_MINUTES);
        Self {
            symbols,
            interval: Duration::from_secs(minutes * 60),
            snapshot_path: env::var("SNAPSHOT_CSV")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_CSV.to_string()),
            output_path: env::var("OUTPUT_CSV")
                .unwrap_or_else(|_| DEFAULT_OUTPUT_CSV.to_string()),
            run_once: env::args().any(|a| a == "--once"),
        }
    }
}

fn build_resolver() -> FusionResolver {
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

async fn run_cycle(orchestrator: &BatchOrchestrator, config: &PollerConfig) -> anyhow::Result<()> {
    let report = orchestrator.run_batch(&config.symbols).await?;

    for failure in &report.failures {
        tracing::warn!(symbol = %failure.symbol, reason = %failure.reason, "symbol skipped");
    }
    if report.is_total_failure() {
        anyhow::bail!("no symbol in the batch produced data");
    }

    CsvSink::new(&config.snapshot_path)
        .replace(&batch_orchestrator::emit_snapshot_rows(&report.records))?;
    CsvSink::new(&config.output_path)
        .replace(&batch_orchestrator::emit_rows(&report.records, &report.scores))?;

    tracing::info!(
        scored = report.scores.len(),
        failed = report.failures.len(),
        output = %config.output_path,
        "cycle written"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = PollerConfig::from_env();
    let orchestrator = BatchOrchestrator::new(build_resolver(), ScoringEngine::default());

    tracing::info!(
        symbols = ?config.symbols,
        interval_secs = config.interval.as_secs(),
        once = config.run_once,
        "poller starting"
    );

    if config.run_once {
        return run_cycle(&orchestrator, &config).await;
    }

    loop {
        if let Err(e) = run_cycle(&orchestrator, &config).await {
            tracing::error!(error = %e, "cycle failed, will retry next interval");
        }
        tokio::time::sleep(config.interval).await;
    }
}
