use crate::domain::quote::MoverFact;
use crate::ingest::provider::QuoteSource;

/// Quote one symbol. Any failure, including a missing or non-positive
/// previous close, yields `None`.
pub async fn scan_symbol(quotes: &dyn QuoteSource, symbol: &str) -> Option<MoverFact> {
    match quotes.get_quote(symbol).await {
        Ok(Some(quote)) => Some(MoverFact::from(quote)),
        Ok(None) => {
            tracing::debug!(%symbol, "no usable quote; skipping");
            None
        }
        Err(err) => {
            tracing::warn!(%symbol, error = %err, "quote lookup failed; skipping");
            None
        }
    }
}

/// Facts for every symbol whose lookup succeeds, in input order.
///
/// Input is taken as given: unsorted, possibly with repeats.
pub async fn scan(quotes: &dyn QuoteSource, symbols: &[String]) -> Vec<MoverFact> {
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if let Some(fact) = scan_symbol(quotes, symbol).await {
            out.push(fact);
        }
    }
    out
}
