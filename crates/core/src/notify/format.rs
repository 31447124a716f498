use crate::domain::quote::QualifyingSymbol;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

const NOT_AVAILABLE: &str = "N/A";

/// One header line, then one line per symbol in input order.
pub fn format_alert<Tz>(
    qualifying: &[QualifyingSymbol],
    threshold_pct: f64,
    haircut_rate: f64,
    now: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = Vec::with_capacity(qualifying.len() + 1);
    lines.push(format!(
        "ALERT: ≥ {threshold_pct}% movers ({})",
        now.format("%H:%M %Z")
    ));

    let haircut_pct = haircut_rate * 100.0;
    for q in qualifying {
        let anchor = if q.anchor.is_available() {
            format!("${:.2}", q.anchor.value)
        } else {
            NOT_AVAILABLE.to_string()
        };
        lines.push(format!(
            "{} {:+.1}% | last ${:.2} | prev ${:.2} | anchor ({haircut_pct:.1}%) {anchor} | targets {} ({})",
            q.symbol, q.pct_change, q.last_price, q.previous_close, q.target_count, q.anchor.method,
        ));
    }

    lines.join("\n")
}
