use crate::domain::anchor::{AnalystTargetSet, MIN_TRIMMED_TARGETS};
use crate::domain::quote::Quote;
use anyhow::Result;

#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Symbols to evaluate this run. May be a curated fallback list when the
    /// ranked source is unavailable.
    async fn list_candidates(&self) -> Result<Vec<String>>;
}

#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` when the provider has no usable quote for the symbol.
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>>;
}

#[async_trait::async_trait]
pub trait AnalystTargetSource: Send + Sync {
    async fn get_individual_targets(&self, symbol: &str) -> Result<Vec<f64>>;

    async fn get_consensus_target(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Individual targets, plus the consensus only when there are too few
/// targets for a trimmed mean.
pub async fn fetch_target_set(
    source: &dyn AnalystTargetSource,
    symbol: &str,
) -> Result<AnalystTargetSet> {
    let individual_targets = source.get_individual_targets(symbol).await?;
    let consensus = if individual_targets.len() < MIN_TRIMMED_TARGETS {
        source.get_consensus_target(symbol).await?
    } else {
        None
    };

    Ok(AnalystTargetSet {
        symbol: symbol.to_string(),
        individual_targets,
        consensus,
    })
}
