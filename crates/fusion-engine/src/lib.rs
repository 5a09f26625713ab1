//! Priority-ordered fusion of partial provider records.
//!
//! The resolver consults adapters strictly in the order they were
//! registered: the first adapter produces the base record, and every later
//! adapter is asked (once) only while fields remain empty. A field filled
//! by a higher-priority adapter is frozen; provider failures and timeouts
//! degrade to "no data" and never abort fusion for the symbol.

use std::sync::Arc;
use std::time::Duration;

use screener_core::{FetchOutcome, FusedRecord, ProviderAdapter, ProviderKind, ScreenerError};

pub struct FusionResolver {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    call_timeout: Duration,
}

impl FusionResolver {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, call_timeout: Duration) -> Self {
        Self {
            adapters,
            call_timeout,
        }
    }

    /// The priority chain, highest priority first. Exposed so that callers
    /// and tests can inspect provenance ordering instead of relying on
    /// implicit code order.
    pub fn provider_chain(&self) -> Vec<ProviderKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    /// Fuse one symbol across the provider chain.
    ///
    /// Returns `SymbolUnavailable` only when no adapter produced any usable
    /// field; a partially filled record is a success.
    pub async fn fuse(&self, symbol: &str) -> Result<FusedRecord, ScreenerError> {
        let mut record = FusedRecord::new(symbol);
        let mut any_data = false;

        for adapter in &self.adapters {
            let kind = adapter.kind();
            match tokio::time::timeout(self.call_timeout, adapter.fetch(symbol)).await {
                Err(_) => {
                    tracing::warn!(symbol, provider = kind.as_str(), "provider call timed out");
                }
                Ok(Err(e)) => {
                    tracing::warn!(symbol, provider = kind.as_str(), error = %e, "provider failed, falling through");
                }
                Ok(Ok(FetchOutcome::NoData)) => {
                    tracing::debug!(symbol, provider = kind.as_str(), "provider has no data");
                }
                Ok(Ok(FetchOutcome::Data(patch))) => {
                    if !patch.is_blank() {
                        any_data = true;
                    }
                    record.absorb(&patch, kind);
                }
            }

            if record.missing().is_empty() {
                break;
            }
        }

        if !any_data {
            return Err(ScreenerError::SymbolUnavailable(symbol.to_string()));
        }

        tracing::debug!(
            symbol,
            filled = record.provenance.len(),
            missing = record.missing().len(),
            "fusion complete"
        );
        Ok(record)
    }
}
