use crate::config::Settings;
use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

// Local wall-clock times; open is inclusive, close exclusive.
const DEFAULT_OPEN: (u32, u32) = (10, 0);
const DEFAULT_CLOSE: (u32, u32) = (15, 0);

const DEFAULT_WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

#[derive(Debug, Clone, PartialEq)]
pub struct TradingWindow {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub weekdays: Vec<Weekday>,
}

impl Default for TradingWindow {
    fn default() -> Self {
        Self {
            tz: DEFAULT_TIMEZONE,
            open: hm(DEFAULT_OPEN),
            close: hm(DEFAULT_CLOSE),
            weekdays: DEFAULT_WEEKDAYS.to_vec(),
        }
    }
}

impl TradingWindow {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(s) = settings.market_timezone.as_deref() {
            out.tz = s
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("MARKET_TIMEZONE {s:?} is not a known zone: {e}"))?;
        }
        if let Some(s) = settings.trading_window_open.as_deref() {
            out.open = parse_hhmm(s).context("invalid TRADING_WINDOW_OPEN")?;
        }
        if let Some(s) = settings.trading_window_close.as_deref() {
            out.close = parse_hhmm(s).context("invalid TRADING_WINDOW_CLOSE")?;
        }
        if let Some(s) = settings.trading_weekdays.as_deref() {
            out.weekdays = parse_weekdays(s)?;
        }

        anyhow::ensure!(
            out.open < out.close,
            "trading window open {} must be before close {}",
            out.open,
            out.close
        );
        anyhow::ensure!(!out.weekdays.is_empty(), "TRADING_WEEKDAYS must not be empty");

        Ok(out)
    }

    pub fn local_now(&self, now_utc: DateTime<Utc>) -> DateTime<Tz> {
        now_utc.with_timezone(&self.tz)
    }

    /// Exchange-local calendar date used as the ledger key.
    pub fn date_key(&self, now_utc: DateTime<Utc>) -> NaiveDate {
        self.local_now(now_utc).date_naive()
    }

    pub fn contains(&self, now_utc: DateTime<Utc>) -> bool {
        let local = self.local_now(now_utc);
        if !self.weekdays.contains(&local.weekday()) {
            return false;
        }
        let t = local.time();
        self.open <= t && t < self.close
    }
}

fn hm((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

fn parse_hhmm(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM (got {s:?})"))
}

fn parse_weekdays(s: &str) -> anyhow::Result<Vec<Weekday>> {
    let mut out = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let day = part
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("TRADING_WEEKDAYS: unknown weekday {part:?}"))?;
        if !out.contains(&day) {
            out.push(day);
        }
    }
    Ok(out)
}
