use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use moverwatch_core::config::{AlertConfig, Settings};
use moverwatch_core::ingest::fmp::FmpClient;
use moverwatch_core::ingest::twelve_data::TwelveDataClient;
use moverwatch_core::notify::discord::DiscordPublisher;
use moverwatch_core::notify::Publisher;
use moverwatch_core::pipeline::{self, Collaborators, PipelineOutcome};
use moverwatch_core::storage::gist::{GistLedgerStore, LedgerStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod dry_run;

#[derive(Debug, Parser)]
#[command(name = "moverwatch_worker")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan, qualify and publish once. The default.
    Run(RunArgs),

    /// Create a private gist holding an empty alert ledger and print its id.
    InitLedger,

    /// Post a message to the channel to check publisher credentials.
    SendTest {
        #[arg(long, default_value = "Hello world!")]
        text: String,
    },
}

#[derive(Debug, Default, clap::Args)]
struct RunArgs {
    /// Log the alert instead of posting it and leave the ledger untouched.
    #[arg(long)]
    dry_run: bool,

    /// Evaluate as of this RFC 3339 instant instead of the current time.
    #[arg(long)]
    now: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(run_args) => run_once(&settings, run_args).await,
        Command::InitLedger => init_ledger(&settings).await,
        Command::SendTest { text } => send_test(&settings, &text).await,
    }
}

async fn run_once(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let config = AlertConfig::from_settings(settings).context("invalid configuration")?;
    let now = resolve_now(args.now.as_deref())?;

    tracing::info!(
        threshold_pct = config.alert_threshold_pct,
        haircut_pct = config.haircut_rate * 100.0,
        dry_run = args.dry_run,
        "configuration loaded"
    );

    let timeout = config.http_timeout;
    let market = TwelveDataClient::from_settings(settings, timeout, config.max_candidates)?;
    let analysts = FmpClient::from_settings(settings, timeout)?;
    let gist = GistLedgerStore::from_settings(settings, timeout)?;
    let discord = DiscordPublisher::from_settings(settings, timeout)?;

    let read_only = dry_run::ReadOnlyLedger(&gist);
    let log_only = dry_run::LogPublisher;
    let ledger: &dyn LedgerStore = if args.dry_run { &read_only } else { &gist };
    let publisher: &dyn Publisher = if args.dry_run { &log_only } else { &discord };

    let collab = Collaborators {
        candidates: &market,
        quotes: &market,
        targets: &analysts,
        ledger,
        publisher,
    };

    match pipeline::run(&config, &collab, now).await {
        PipelineOutcome::Failed { error, summary } => {
            let err = anyhow::Error::new(error).context(format!(
                "failed to publish alert for {} symbols",
                summary.qualifying
            ));
            sentry_anyhow::capture_anyhow(&err);
            Err(err)
        }
        outcome => {
            tracing::info!(?outcome, "run complete");
            Ok(())
        }
    }
}

async fn init_ledger(settings: &Settings) -> anyhow::Result<()> {
    let gist_id =
        moverwatch_core::storage::gist::create_ledger_gist(settings, settings.http_timeout()?)
            .await?;
    tracing::info!(%gist_id, "created ledger gist; set GIST_ID to this value");
    println!("{gist_id}");
    Ok(())
}

async fn send_test(settings: &Settings, text: &str) -> anyhow::Result<()> {
    let discord = DiscordPublisher::from_settings(settings, settings.http_timeout()?)?;
    let message_id = discord
        .post(text)
        .await
        .context("test message was not posted")?;
    tracing::info!(%message_id, "test message posted");
    Ok(())
}

fn resolve_now(now_arg: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match now_arg {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("--now must be RFC 3339 (got {s:?})"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
