use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Symbols already alerted, keyed by exchange-local `YYYY-MM-DD`.
///
/// Absent dates read as empty sets. Entries are only ever added; retention is
/// left to whoever owns the stored blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyLedger {
    days: BTreeMap<String, BTreeSet<String>>,
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl DailyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).context("ledger blob is not a date -> [symbol] map")
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize ledger")
    }

    pub fn is_alerted(&self, date: NaiveDate, symbol: &str) -> bool {
        self.days
            .get(&date_key(date))
            .is_some_and(|set| set.contains(symbol))
    }

    /// Union `symbols` into the date's set. Recording a symbol twice is a no-op.
    pub fn record<I, S>(mut self, date: NaiveDate, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.days.entry(date_key(date)).or_default();
        set.extend(symbols.into_iter().map(Into::<String>::into));
        self
    }

    pub fn alerted_on(&self, date: NaiveDate) -> usize {
        self.days.get(&date_key(date)).map_or(0, BTreeSet::len)
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }
}
