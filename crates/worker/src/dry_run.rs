use moverwatch_core::notify::error::PublishError;
use moverwatch_core::notify::Publisher;
use moverwatch_core::storage::gist::LedgerStore;
use moverwatch_core::storage::ledger::DailyLedger;

pub const DRY_RUN_MESSAGE_ID: &str = "dry-run";

/// Loads through the wrapped store; never writes.
pub struct ReadOnlyLedger<'a>(pub &'a dyn LedgerStore);

#[async_trait::async_trait]
impl LedgerStore for ReadOnlyLedger<'_> {
    async fn load(&self) -> anyhow::Result<DailyLedger> {
        self.0.load().await
    }

    async fn save(&self, ledger: &DailyLedger) -> anyhow::Result<()> {
        tracing::info!(dates = ledger.dates().count(), "dry run: ledger not saved");
        Ok(())
    }
}

pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn post(&self, text: &str) -> Result<String, PublishError> {
        tracing::info!("dry run: alert not posted\n{text}");
        Ok(DRY_RUN_MESSAGE_ID.to_string())
    }
}
