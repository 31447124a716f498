use crate::domain::anchor::Anchor;
use serde::{Deserialize, Serialize};

/// Validated price snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub previous_close: f64,
    pub last_price: f64,
}

impl Quote {
    /// Returns `None` unless both prices are finite and positive.
    pub fn new(symbol: impl Into<String>, previous_close: f64, last_price: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(previous_close) || !valid(last_price) {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            previous_close,
            last_price,
        })
    }

    /// Signed change versus the previous close, in percent.
    pub fn pct_change(&self) -> f64 {
        (self.last_price - self.previous_close) / self.previous_close * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverFact {
    pub symbol: String,
    pub pct_change: f64,
    pub last_price: f64,
    pub previous_close: f64,
}

impl From<Quote> for MoverFact {
    fn from(q: Quote) -> Self {
        Self {
            pct_change: q.pct_change(),
            symbol: q.symbol,
            last_price: q.last_price,
            previous_close: q.previous_close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifyingSymbol {
    pub symbol: String,
    pub pct_change: f64,
    pub last_price: f64,
    pub previous_close: f64,
    pub anchor: Anchor,
    pub target_count: usize,
}
