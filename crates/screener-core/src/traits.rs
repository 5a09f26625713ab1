use async_trait::async_trait;

use crate::{FieldPatch, ProviderKind, ScreenerError};

/// Outcome of a provider call that completed without a hard failure.
///
/// `NoData` means the provider answered but has nothing for this symbol;
/// hard failures (network, auth, unparseable body) surface as the `Err`
/// arm of `ProviderAdapter::fetch` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Data(FieldPatch),
    NoData,
}

/// Contract for a single upstream data provider.
///
/// One `fetch` performs one external request and returns whatever subset
/// of the field schema the provider knows about, already validated and
/// coerced. Implementations hold their own client state and share nothing
/// mutable across calls for different symbols.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ScreenerError>;
}
