use crate::config::AlertConfig;
use crate::domain::quote::{MoverFact, QualifyingSymbol};
use crate::ingest::provider::{fetch_target_set, AnalystTargetSource, CandidateSource, QuoteSource};
use crate::notify::error::PublishError;
use crate::notify::format::format_alert;
use crate::notify::Publisher;
use crate::pipeline::scanner;
use crate::storage::gist::LedgerStore;
use crate::storage::ledger::DailyLedger;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

// Absorbs float noise such as (1.90 - 1.00) / 1.00 * 100 == 89.99999999999999.
const PCT_EPSILON: f64 = 1e-9;

pub struct Collaborators<'a> {
    pub candidates: &'a dyn CandidateSource,
    pub quotes: &'a dyn QuoteSource,
    pub targets: &'a dyn AnalystTargetSource,
    pub ledger: &'a dyn LedgerStore,
    pub publisher: &'a dyn Publisher,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub already_alerted: usize,
    pub checked: usize,
    pub below_threshold: usize,
    pub qualifying: usize,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    OutsideWindow,
    NoCandidates,
    NoQualifiers(RunSummary),
    Published {
        message_id: String,
        summary: RunSummary,
        ledger_saved: bool,
    },
    Failed {
        error: PublishError,
        summary: RunSummary,
    },
}

impl PipelineOutcome {
    /// Only a failed publish is a failed run.
    pub fn is_success(&self) -> bool {
        !matches!(self, PipelineOutcome::Failed { .. })
    }
}

/// Boundary is inclusive: only `pct_change < threshold` is rejected.
pub fn meets_threshold(pct_change: f64, threshold_pct: f64) -> bool {
    pct_change + PCT_EPSILON >= threshold_pct
}

pub async fn run(
    config: &AlertConfig,
    collab: &Collaborators<'_>,
    now: DateTime<Utc>,
) -> PipelineOutcome {
    if !config.window.contains(now) {
        tracing::info!(%now, "outside trading window; nothing to do");
        return PipelineOutcome::OutsideWindow;
    }

    // Fixed for the whole run, even if it straddles midnight.
    let today = config.window.date_key(now);

    let ledger = match collab.ledger.load().await {
        Ok(ledger) => ledger,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load alert ledger; treating as empty");
            DailyLedger::new()
        }
    };

    let candidates = match collab.candidates.list_candidates().await {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(
                source = collab.candidates.source_name(),
                error = %err,
                "candidate listing failed"
            );
            Vec::new()
        }
    };
    if candidates.is_empty() {
        tracing::info!("no candidate symbols; nothing to do");
        return PipelineOutcome::NoCandidates;
    }
    tracing::info!(count = candidates.len(), %today, "evaluating candidates");

    let mut summary = RunSummary {
        candidates: candidates.len(),
        ..Default::default()
    };

    let fresh = exclude_alerted(&ledger, today, candidates, &mut summary);
    let facts = scanner::scan(collab.quotes, &fresh).await;
    summary.checked = facts.len();

    let qualifying = qualify(config, collab.targets, facts, &mut summary).await;
    summary.qualifying = qualifying.len();

    tracing::info!(
        candidates = summary.candidates,
        checked = summary.checked,
        already_alerted = summary.already_alerted,
        below_threshold = summary.below_threshold,
        qualifying = summary.qualifying,
        threshold_pct = config.alert_threshold_pct,
        "qualification summary"
    );

    if qualifying.is_empty() {
        return PipelineOutcome::NoQualifiers(summary);
    }

    let updated = ledger.record(today, qualifying.iter().map(|q| q.symbol.clone()));
    let ledger_saved = match collab.ledger.save(&updated).await {
        Ok(()) => true,
        Err(err) => {
            // Publishing still goes ahead; a later run may alert these again.
            tracing::warn!(error = %err, "failed to save alert ledger; continuing to publish");
            false
        }
    };

    let message = format_alert(
        &qualifying,
        config.alert_threshold_pct,
        config.haircut_rate,
        &config.window.local_now(now),
    );

    match collab.publisher.post(&message).await {
        Ok(message_id) => {
            tracing::info!(
                publisher = collab.publisher.name(),
                %message_id,
                symbols = summary.qualifying,
                "alert published"
            );
            PipelineOutcome::Published {
                message_id,
                summary,
                ledger_saved,
            }
        }
        Err(error) => {
            tracing::error!(publisher = collab.publisher.name(), error = %error, "publish failed");
            PipelineOutcome::Failed { error, summary }
        }
    }
}

/// Drops symbols alerted earlier today, and repeats within this run.
fn exclude_alerted(
    ledger: &DailyLedger,
    today: NaiveDate,
    candidates: Vec<String>,
    summary: &mut RunSummary,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for symbol in candidates {
        if ledger.is_alerted(today, &symbol) {
            summary.already_alerted += 1;
            continue;
        }
        if !seen.insert(symbol.clone()) {
            continue;
        }
        out.push(symbol);
    }
    out
}

async fn qualify(
    config: &AlertConfig,
    targets: &dyn AnalystTargetSource,
    facts: Vec<MoverFact>,
    summary: &mut RunSummary,
) -> Vec<QualifyingSymbol> {
    let mut out = Vec::new();
    for fact in facts {
        if !meets_threshold(fact.pct_change, config.alert_threshold_pct) {
            summary.below_threshold += 1;
            continue;
        }

        let set = match fetch_target_set(targets, &fact.symbol).await {
            Ok(set) => set,
            Err(err) => {
                tracing::warn!(symbol = %fact.symbol, error = %err, "target lookup failed; skipping");
                continue;
            }
        };

        let anchor = set.anchor(config.haircut_rate);
        tracing::debug!(
            symbol = %fact.symbol,
            pct_change = fact.pct_change,
            anchor = anchor.value,
            method = %anchor.method,
            "qualifying mover"
        );

        out.push(QualifyingSymbol {
            target_count: set.target_count(),
            symbol: fact.symbol,
            pct_change: fact.pct_change,
            last_price: fact.last_price,
            previous_close: fact.previous_close,
            anchor,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::Quote;
    use crate::time::us_market::TradingWindow;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Candidates {
        symbols: Option<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CandidateSource for Candidates {
        fn source_name(&self) -> &'static str {
            "fake"
        }

        async fn list_candidates(&self) -> anyhow::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.symbols {
                Some(s) => Ok(s.iter().map(|s| s.to_string()).collect()),
                None => anyhow::bail!("movers endpoint down"),
            }
        }
    }

    // Missing symbols fault.
    struct Quotes(HashMap<&'static str, (f64, f64)>);

    #[async_trait::async_trait]
    impl QuoteSource for Quotes {
        async fn get_quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
            let (prev, last) = self
                .0
                .get(symbol)
                .ok_or_else(|| anyhow::anyhow!("timeout"))?;
            Ok(Quote::new(symbol, *prev, *last))
        }
    }

    #[derive(Default)]
    struct Targets {
        individual: HashMap<&'static str, Vec<f64>>,
        consensus: HashMap<&'static str, f64>,
        failing: Vec<&'static str>,
        consensus_calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl AnalystTargetSource for Targets {
        async fn get_individual_targets(&self, symbol: &str) -> anyhow::Result<Vec<f64>> {
            if self.failing.iter().any(|s| *s == symbol) {
                anyhow::bail!("malformed response");
            }
            Ok(self.individual.get(symbol).cloned().unwrap_or_default())
        }

        async fn get_consensus_target(&self, symbol: &str) -> anyhow::Result<Option<f64>> {
            self.consensus_calls.lock().unwrap().push(symbol.to_string());
            Ok(self.consensus.get(symbol).copied())
        }
    }

    #[derive(Default)]
    struct Ledger {
        initial: DailyLedger,
        fail_load: bool,
        fail_save: bool,
        loads: AtomicUsize,
        saved: Mutex<Vec<DailyLedger>>,
    }

    #[async_trait::async_trait]
    impl LedgerStore for Ledger {
        async fn load(&self) -> anyhow::Result<DailyLedger> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_load {
                anyhow::bail!("gist unavailable");
            }
            Ok(self.initial.clone())
        }

        async fn save(&self, ledger: &DailyLedger) -> anyhow::Result<()> {
            if self.fail_save {
                anyhow::bail!("gist write rejected");
            }
            self.saved.lock().unwrap().push(ledger.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Channel {
        fail_with: Option<PublishError>,
        posted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Publisher for Channel {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn post(&self, text: &str) -> Result<String, PublishError> {
            self.posted.lock().unwrap().push(text.to_string());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok("msg-1".to_string()),
            }
        }
    }

    struct World {
        candidates: Candidates,
        quotes: Quotes,
        targets: Targets,
        ledger: Ledger,
        channel: Channel,
    }

    impl World {
        fn new(symbols: &[&'static str], quotes: &[(&'static str, f64, f64)]) -> Self {
            Self {
                candidates: Candidates {
                    symbols: Some(symbols.to_vec()),
                    calls: AtomicUsize::new(0),
                },
                quotes: Quotes(quotes.iter().map(|(s, p, l)| (*s, (*p, *l))).collect()),
                targets: Targets::default(),
                ledger: Ledger::default(),
                channel: Channel::default(),
            }
        }

        async fn run_at(&self, now: DateTime<Utc>) -> PipelineOutcome {
            let collab = Collaborators {
                candidates: &self.candidates,
                quotes: &self.quotes,
                targets: &self.targets,
                ledger: &self.ledger,
                publisher: &self.channel,
            };
            run(&config(), &collab, now).await
        }

        async fn run(&self) -> PipelineOutcome {
            self.run_at(open_market()).await
        }

        fn posted(&self) -> Vec<String> {
            self.channel.posted.lock().unwrap().clone()
        }

        fn saved(&self) -> Vec<DailyLedger> {
            self.ledger.saved.lock().unwrap().clone()
        }
    }

    fn config() -> AlertConfig {
        AlertConfig {
            alert_threshold_pct: 90.0,
            haircut_rate: 0.125,
            window: TradingWindow::default(),
            http_timeout: Duration::from_secs(10),
            max_candidates: 50,
        }
    }

    // Monday 2026-01-05, 10:30 PST.
    fn open_market() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 18, 30, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn alerted(line: &str) -> &str {
        line.split_whitespace().next().unwrap_or_default()
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let at = Quote::new("AT", 1.00, 1.90).unwrap().pct_change();
        let below = Quote::new("BELOW", 1.00, 1.89).unwrap().pct_change();
        assert!((at - 90.0).abs() < 1e-9);
        assert!((below - 89.0).abs() < 1e-9);
        assert!(meets_threshold(at, 90.0));
        assert!(!meets_threshold(below, 90.0));
        assert!(!meets_threshold(89.99, 90.0));
    }

    #[tokio::test]
    async fn outside_window_touches_nothing() {
        let world = World::new(&["ABC"], &[("ABC", 1.0, 3.0)]);
        // Saturday.
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 18, 30, 0).unwrap();

        let outcome = world.run_at(now).await;
        assert!(matches!(outcome, PipelineOutcome::OutsideWindow));
        assert!(outcome.is_success());
        assert_eq!(world.candidates.calls.load(Ordering::SeqCst), 0);
        assert_eq!(world.ledger.loads.load(Ordering::SeqCst), 0);
        assert!(world.posted().is_empty());
    }

    #[tokio::test]
    async fn publishes_qualifiers_and_records_them() {
        let mut world = World::new(
            &["FLAT", "AT", "BELOW", "BIG"],
            &[
                ("FLAT", 10.0, 10.5),
                ("AT", 1.00, 1.90),
                ("BELOW", 1.00, 1.89),
                ("BIG", 0.94, 2.18),
            ],
        );
        world.targets.individual.insert("BIG", vec![20.0, 12.0, 16.0, 10.0, 18.0]);

        let outcome = world.run().await;
        let PipelineOutcome::Published {
            message_id,
            summary,
            ledger_saved,
        } = &outcome
        else {
            panic!("expected publish, got {outcome:?}");
        };
        assert_eq!(message_id, "msg-1");
        assert!(*ledger_saved);
        assert_eq!(
            summary,
            &RunSummary {
                candidates: 4,
                already_alerted: 0,
                checked: 4,
                below_threshold: 2,
                qualifying: 2,
            }
        );

        let posted = world.posted();
        assert_eq!(posted.len(), 1);
        let lines: Vec<&str> = posted[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(alerted(lines[1]), "AT");
        assert_eq!(alerted(lines[2]), "BIG");
        assert!(lines[2].contains("anchor (12.5%) $13.42"));
        assert!(lines[2].ends_with("targets 5 (trimmed)"));

        let saved = world.saved();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].is_alerted(today(), "AT"));
        assert!(saved[0].is_alerted(today(), "BIG"));
        assert!(!saved[0].is_alerted(today(), "BELOW"));
        assert!(!saved[0].is_alerted(today(), "FLAT"));
    }

    #[tokio::test]
    async fn already_alerted_symbols_are_excluded() {
        let mut world = World::new(&["OLD", "NEW"], &[("OLD", 1.0, 5.0), ("NEW", 1.0, 2.0)]);
        world.ledger.initial = DailyLedger::new().record(today(), ["OLD"]);

        let outcome = world.run().await;
        let PipelineOutcome::Published { summary, .. } = &outcome else {
            panic!("expected publish, got {outcome:?}");
        };
        assert_eq!(summary.already_alerted, 1);
        assert_eq!(summary.checked, 1);

        let posted = world.posted();
        assert!(!posted[0].contains("OLD"));
        assert!(posted[0].contains("NEW +100.0%"));

        let saved = world.saved();
        assert_eq!(saved[0].alerted_on(today()), 2);
    }

    #[tokio::test]
    async fn yesterdays_alerts_do_not_block_today() {
        let mut world = World::new(&["ABC"], &[("ABC", 1.0, 2.0)]);
        let yesterday = today().pred_opt().unwrap();
        world.ledger.initial = DailyLedger::new().record(yesterday, ["ABC"]);

        let outcome = world.run().await;
        assert!(matches!(outcome, PipelineOutcome::Published { .. }));
        let saved = world.saved();
        assert!(saved[0].is_alerted(yesterday, "ABC"));
        assert!(saved[0].is_alerted(today(), "ABC"));
    }

    #[tokio::test]
    async fn nothing_qualifying_is_a_silent_no_op() {
        let world = World::new(&["A", "B"], &[("A", 1.0, 1.2), ("B", 1.0, 0.5)]);

        let outcome = world.run().await;
        let PipelineOutcome::NoQualifiers(summary) = &outcome else {
            panic!("expected no qualifiers, got {outcome:?}");
        };
        assert_eq!(summary.below_threshold, 2);
        assert!(world.posted().is_empty());
        assert!(world.saved().is_empty());
    }

    #[tokio::test]
    async fn quote_fault_for_one_symbol_spares_the_rest() {
        let world = World::new(&["GONE", "UP"], &[("UP", 1.0, 2.5)]);

        let outcome = world.run().await;
        let PipelineOutcome::Published { summary, .. } = &outcome else {
            panic!("expected publish, got {outcome:?}");
        };
        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.checked, 1);
        assert!(world.posted()[0].contains("UP +150.0%"));
        assert!(!world.saved()[0].is_alerted(today(), "GONE"));
    }

    #[tokio::test]
    async fn target_fault_skips_only_that_symbol() {
        let mut world = World::new(&["BAD", "GOOD"], &[("BAD", 1.0, 3.0), ("GOOD", 1.0, 3.0)]);
        world.targets.failing.push("BAD");

        let outcome = world.run().await;
        assert!(matches!(outcome, PipelineOutcome::Published { .. }));
        let lines: Vec<String> = world.posted()[0].lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(alerted(&lines[1]), "GOOD");
        assert!(!world.saved()[0].is_alerted(today(), "BAD"));
    }

    #[tokio::test]
    async fn consensus_only_fetched_with_fewer_than_three_targets() {
        let mut world = World::new(
            &["MANY", "FEW", "NONE"],
            &[("MANY", 1.0, 2.0), ("FEW", 1.0, 2.0), ("NONE", 1.0, 2.0)],
        );
        world.targets.individual.insert("MANY", vec![1.0, 2.0, 3.0]);
        world.targets.individual.insert("FEW", vec![1.0, 2.0]);
        world.targets.consensus.insert("FEW", 16.0);

        world.run().await;

        let calls = world.targets.consensus_calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["FEW", "NONE"]);

        let posted = world.posted();
        let lines: Vec<&str> = posted[0].lines().collect();
        assert!(lines[1].ends_with("targets 3 (trimmed)"));
        assert!(lines[2].contains("$14.00 | targets 2 (fallback)"));
        assert!(lines[3].contains("N/A | targets 0 (none)"));
    }

    #[tokio::test]
    async fn duplicate_candidates_alert_once() {
        let world = World::new(&["DUP", "DUP"], &[("DUP", 1.0, 2.0)]);

        world.run().await;
        assert_eq!(world.posted()[0].lines().count(), 2);
    }

    #[tokio::test]
    async fn ledger_save_failure_still_publishes() {
        let mut world = World::new(&["UP"], &[("UP", 1.0, 2.0)]);
        world.ledger.fail_save = true;

        let outcome = world.run().await;
        let PipelineOutcome::Published { ledger_saved, .. } = &outcome else {
            panic!("expected publish, got {outcome:?}");
        };
        assert!(!*ledger_saved);
        assert_eq!(world.posted().len(), 1);
    }

    #[tokio::test]
    async fn ledger_load_failure_reads_as_empty() {
        let mut world = World::new(&["UP"], &[("UP", 1.0, 2.0)]);
        world.ledger.fail_load = true;

        let outcome = world.run().await;
        assert!(matches!(outcome, PipelineOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn publish_failure_fails_the_run_after_recording() {
        let mut world = World::new(&["UP"], &[("UP", 1.0, 2.0)]);
        world.channel.fail_with = Some(PublishError::Forbidden);

        let outcome = world.run().await;
        assert!(!outcome.is_success());
        let PipelineOutcome::Failed { error, summary } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(error, PublishError::Forbidden);
        assert_eq!(summary.qualifying, 1);
        assert_eq!(world.saved().len(), 1);
    }

    #[tokio::test]
    async fn no_candidates_ends_the_run() {
        let world = World::new(&[], &[]);
        assert!(matches!(world.run().await, PipelineOutcome::NoCandidates));

        let mut failing = World::new(&[], &[]);
        failing.candidates.symbols = None;
        let outcome = failing.run().await;
        assert!(matches!(outcome, PipelineOutcome::NoCandidates));
        assert!(outcome.is_success());
        assert!(failing.saved().is_empty());
    }
}
