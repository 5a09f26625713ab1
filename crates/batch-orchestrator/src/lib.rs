//! Batch pipeline: fuse every symbol, build sector distributions from the
//! surviving records, then score each record against its sector.
//!
//! One bad symbol never sinks the batch; per-symbol failures are collected
//! in the report and only an empty input or a total wipeout is an error.

pub mod table;

pub use table::{
    emit_rows, emit_snapshot_rows, parse_table, snapshot_header, CsvSink, TabularSink,
    OUTPUT_HEADER, REQUIRED_COLUMNS,
};

use chrono::{DateTime, Utc};

use fusion_engine::FusionResolver;
use quant_scoring::{ScoringEngine, SectorBuckets};
use screener_core::{FusedRecord, ScoreBreakdown, ScreenerError};

/// One symbol the batch could not fuse, with the reason it was dropped.
#[derive(Debug, Clone)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Outcome of one batch cycle. Records and scores are in input order,
/// failures in the order they occurred.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub records: Vec<FusedRecord>,
    pub scores: Vec<ScoreBreakdown>,
    pub failures: Vec<SymbolFailure>,
}

impl BatchReport {
    /// True when not a single symbol survived fusion.
    pub fn is_total_failure(&self) -> bool {
        self.records.is_empty() && !self.failures.is_empty()
    }
}

pub struct BatchOrchestrator {
    resolver: FusionResolver,
    engine: ScoringEngine,
}

impl BatchOrchestrator {
    pub fn new(resolver: FusionResolver, engine: ScoringEngine) -> Self {
        Self { resolver, engine }
    }

    /// Run one full cycle over `symbols`.
    ///
    /// Sector distributions are built only from the records that fused
    /// successfully in this cycle, so a dropped symbol also drops out of
    /// its sector's statistics.
    pub async fn run_batch(&self, symbols: &[String]) -> Result<BatchReport, ScreenerError> {
        if symbols.is_empty() {
            return Err(ScreenerError::EmptyBatch);
        }

        let started_at = Utc::now();
        let mut records = Vec::with_capacity(symbols.len());
        let mut failures = Vec::new();

        for symbol in symbols {
            match self.resolver.fuse(symbol).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(symbol, error = %e, "symbol dropped from batch");
                    failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let buckets = SectorBuckets::build(&records);
        let scores = records
            .iter()
            .map(|r| self.engine.score(r, buckets.get(r.fields.sector.as_deref())))
            .collect::<Vec<_>>();

        tracing::info!(
            total = symbols.len(),
            scored = scores.len(),
            failed = failures.len(),
            sectors = buckets.len(),
            "batch cycle complete"
        );

        Ok(BatchReport {
            started_at,
            records,
            scores,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use screener_core::{FetchOutcome, FieldPatch, ProviderAdapter, ProviderKind};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// Adapter with per-symbol canned patches; unknown symbols get no data.
    struct TableAdapter {
        patches: HashMap<String, FieldPatch>,
    }

    impl TableAdapter {
        fn new(patches: Vec<(&str, FieldPatch)>) -> Self {
            Self {
                patches: patches
                    .into_iter()
                    .map(|(s, p)| (s.to_string(), p))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for TableAdapter {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Yahoo
        }

        async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ScreenerError> {
            match self.patches.get(symbol) {
                Some(patch) => Ok(FetchOutcome::Data(patch.clone())),
                None => Ok(FetchOutcome::NoData),
            }
        }
    }

    fn patch(sector: &str, price: f64, prev: f64, pe: f64) -> FieldPatch {
        FieldPatch {
            sector: Some(sector.to_string()),
            price: Some(price),
            prev_close: Some(prev),
            pe: Some(pe),
            ..Default::default()
        }
    }

    fn orchestrator(adapter: TableAdapter) -> BatchOrchestrator {
        let resolver = FusionResolver::new(
            vec![Arc::new(adapter) as Arc<dyn ProviderAdapter>],
            Duration::from_secs(5),
        );
        BatchOrchestrator::new(resolver, ScoringEngine::default())
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_batch_is_an_error() {
        let orch = orchestrator(TableAdapter::new(vec![]));
        let err = orch.run_batch(&[]).await.unwrap_err();
        assert!(matches!(err, ScreenerError::EmptyBatch));
    }

    #[tokio::test]
    async fn failed_symbol_does_not_sink_the_batch() {
        let orch = orchestrator(TableAdapter::new(vec![
            ("AAA", patch("Tech", 102.0, 100.0, 20.0)),
            ("BBB", patch("Tech", 50.0, 49.0, 15.0)),
        ]));

        let report = orch.run_batch(&symbols(&["AAA", "MISSING", "BBB"])).await.unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.scores.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "MISSING");
        assert!(!report.is_total_failure());
    }

    #[tokio::test]
    async fn total_failure_is_reported_not_raised() {
        let orch = orchestrator(TableAdapter::new(vec![]));
        let report = orch.run_batch(&symbols(&["XXX", "YYY"])).await.unwrap();
        assert!(report.is_total_failure());
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn scores_follow_input_order() {
        let orch = orchestrator(TableAdapter::new(vec![
            ("AAA", patch("Tech", 102.0, 100.0, 10.0)),
            ("BBB", patch("Tech", 50.0, 49.0, 20.0)),
            ("CCC", patch("Tech", 7.0, 7.0, 30.0)),
        ]));

        let report = orch.run_batch(&symbols(&["CCC", "AAA", "BBB"])).await.unwrap();
        let order: Vec<&str> = report.scores.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(order, vec!["CCC", "AAA", "BBB"]);
    }

    #[tokio::test]
    async fn sector_stats_come_from_surviving_records_only() {
        // Three Tech symbols requested, one unknown. The two survivors
        // leave the P/E sample below the minimum of three, so no z-score.
        let orch = orchestrator(TableAdapter::new(vec![
            ("AAA", patch("Tech", 102.0, 100.0, 10.0)),
            ("BBB", patch("Tech", 50.0, 49.0, 20.0)),
        ]));

        let report = orch.run_batch(&symbols(&["AAA", "BBB", "GONE"])).await.unwrap();
        assert!(report.scores.iter().all(|s| s.pe_z.is_none()));

        // With a third survivor the sample is large enough.
        let orch = orchestrator(TableAdapter::new(vec![
            ("AAA", patch("Tech", 102.0, 100.0, 10.0)),
            ("BBB", patch("Tech", 50.0, 49.0, 20.0)),
            ("CCC", patch("Tech", 7.0, 7.0, 30.0)),
        ]));
        let report = orch.run_batch(&symbols(&["AAA", "BBB", "CCC"])).await.unwrap();
        assert!(report.scores.iter().all(|s| s.pe_z.is_some()));
    }
}
