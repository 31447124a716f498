pub mod domain;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use crate::time::us_market::TradingWindow;
    use anyhow::Context;
    use std::time::Duration;

    pub const DEFAULT_ALERT_THRESHOLD_PCT: f64 = 90.0;
    pub const DEFAULT_HAIRCUT_RATE: f64 = 0.125;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_MAX_CANDIDATES: usize = 50;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub twelve_data_api_key: Option<String>,
        pub fmp_api_key: Option<String>,
        pub discord_bot_token: Option<String>,
        pub discord_channel_id: Option<String>,
        pub gist_id: Option<String>,
        pub gh_pat: Option<String>,
        pub alert_threshold_pct: Option<String>,
        pub haircut_rate: Option<String>,
        pub market_timezone: Option<String>,
        pub trading_window_open: Option<String>,
        pub trading_window_close: Option<String>,
        pub trading_weekdays: Option<String>,
        pub http_timeout_secs: Option<String>,
        pub max_candidates: Option<String>,
        pub twelve_data_base_url: Option<String>,
        pub fmp_base_url: Option<String>,
        pub github_api_base_url: Option<String>,
        pub discord_api_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                twelve_data_api_key: env_opt("TWELVE_DATA_API_KEY"),
                fmp_api_key: env_opt("FMP_API_KEY"),
                discord_bot_token: env_opt("DISCORD_BOT_TOKEN"),
                discord_channel_id: env_opt("DISCORD_CHANNEL_ID"),
                gist_id: env_opt("GIST_ID"),
                gh_pat: env_opt("GH_PAT"),
                alert_threshold_pct: env_opt("ALERT_THRESHOLD_PCT"),
                haircut_rate: env_opt("HAIRCUT_RATE"),
                market_timezone: env_opt("MARKET_TIMEZONE"),
                trading_window_open: env_opt("TRADING_WINDOW_OPEN"),
                trading_window_close: env_opt("TRADING_WINDOW_CLOSE"),
                trading_weekdays: env_opt("TRADING_WEEKDAYS"),
                http_timeout_secs: env_opt("HTTP_TIMEOUT_SECS"),
                max_candidates: env_opt("MAX_CANDIDATES"),
                twelve_data_base_url: env_opt("TWELVE_DATA_BASE_URL"),
                fmp_base_url: env_opt("FMP_BASE_URL"),
                github_api_base_url: env_opt("GITHUB_API_BASE_URL"),
                discord_api_base_url: env_opt("DISCORD_API_BASE_URL"),
                sentry_dsn: env_opt("SENTRY_DSN"),
            })
        }

        pub fn require_discord_bot_token(&self) -> anyhow::Result<&str> {
            self.discord_bot_token
                .as_deref()
                .context("DISCORD_BOT_TOKEN is required")
        }

        pub fn require_discord_channel_id(&self) -> anyhow::Result<&str> {
            self.discord_channel_id
                .as_deref()
                .context("DISCORD_CHANNEL_ID is required")
        }

        pub fn require_gh_pat(&self) -> anyhow::Result<&str> {
            self.gh_pat.as_deref().context("GH_PAT is required")
        }

        pub fn http_timeout(&self) -> anyhow::Result<Duration> {
            let secs = match self.http_timeout_secs.as_deref() {
                Some(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS must be an integer (got {s:?})"))?,
                None => DEFAULT_HTTP_TIMEOUT_SECS,
            };
            anyhow::ensure!(secs >= 1, "HTTP_TIMEOUT_SECS must be >= 1");
            Ok(Duration::from_secs(secs))
        }

        /// Names of required variables that are unset or blank.
        pub fn missing_required(&self) -> Vec<&'static str> {
            [
                ("TWELVE_DATA_API_KEY", &self.twelve_data_api_key),
                ("FMP_API_KEY", &self.fmp_api_key),
                ("DISCORD_BOT_TOKEN", &self.discord_bot_token),
                ("DISCORD_CHANNEL_ID", &self.discord_channel_id),
                ("GIST_ID", &self.gist_id),
                ("GH_PAT", &self.gh_pat),
            ]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name)
            .collect()
        }
    }

    /// Validated run configuration, built once at process start.
    #[derive(Debug, Clone)]
    pub struct AlertConfig {
        pub alert_threshold_pct: f64,
        pub haircut_rate: f64,
        pub window: TradingWindow,
        pub http_timeout: Duration,
        pub max_candidates: usize,
    }

    impl AlertConfig {
        pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
            let missing = settings.missing_required();
            anyhow::ensure!(
                missing.is_empty(),
                "missing required environment variables: {}",
                missing.join(", ")
            );

            let alert_threshold_pct = parse_f64_or(
                settings.alert_threshold_pct.as_deref(),
                "ALERT_THRESHOLD_PCT",
                DEFAULT_ALERT_THRESHOLD_PCT,
            )?;

            let haircut_rate = parse_f64_or(
                settings.haircut_rate.as_deref(),
                "HAIRCUT_RATE",
                DEFAULT_HAIRCUT_RATE,
            )?;
            anyhow::ensure!(
                (0.0..=1.0).contains(&haircut_rate),
                "HAIRCUT_RATE must be a fraction in [0, 1] (got {haircut_rate})"
            );

            let max_candidates = match settings.max_candidates.as_deref() {
                Some(s) => s
                    .parse::<usize>()
                    .with_context(|| format!("MAX_CANDIDATES must be an integer (got {s:?})"))?,
                None => DEFAULT_MAX_CANDIDATES,
            };
            anyhow::ensure!(max_candidates >= 1, "MAX_CANDIDATES must be >= 1");

            Ok(Self {
                alert_threshold_pct,
                haircut_rate,
                window: TradingWindow::from_settings(settings)?,
                http_timeout: settings.http_timeout()?,
                max_candidates,
            })
        }
    }

    fn env_opt(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parse_f64_or(raw: Option<&str>, name: &str, default: f64) -> anyhow::Result<f64> {
        let Some(s) = raw else {
            return Ok(default);
        };
        let v = s
            .parse::<f64>()
            .with_context(|| format!("{name} must be a number (got {s:?})"))?;
        anyhow::ensure!(v.is_finite(), "{name} must be finite (got {s:?})");
        Ok(v)
    }

}
