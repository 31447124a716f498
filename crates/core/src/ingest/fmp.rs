use crate::config::Settings;
use crate::ingest::provider::AnalystTargetSource;
use crate::ingest::types::{FmpConsensus, FmpPriceTarget};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v4";
const PRICE_TARGET_PATH: &str = "/price-target";
const CONSENSUS_PATH: &str = "/price-target-consensus";

/// Financial Modeling Prep analyst targets.
///
/// Lookup failures degrade to "no targets" with a warning, so a mover whose
/// targets cannot be fetched still alerts without an anchor.
#[derive(Debug, Clone)]
pub struct FmpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FmpClient {
    pub fn from_settings(settings: &Settings, timeout: Duration) -> Result<Self> {
        let api_key = settings
            .fmp_api_key
            .clone()
            .context("FMP_API_KEY is required")?;
        let base_url = settings
            .fmp_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, api_key, timeout)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build FMP http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str, symbol: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let res = self
            .http
            .get(url)
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("FMP {path} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read FMP {path} response"))?;
        if !status.is_success() {
            anyhow::bail!("FMP {path} HTTP {status}");
        }

        // FMP answers errors with an object instead of a list.
        let raw = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("FMP {path} response is not valid JSON"))?;
        if !raw.is_array() {
            return Ok(Vec::new());
        }
        serde_json::from_value::<Vec<T>>(raw).with_context(|| format!("failed to parse FMP {path}"))
    }

    async fn fetch_targets(&self, symbol: &str) -> Result<Vec<f64>> {
        let entries = self
            .get_list::<FmpPriceTarget>(PRICE_TARGET_PATH, symbol)
            .await?;
        Ok(entries.iter().filter_map(FmpPriceTarget::value).collect())
    }

    async fn fetch_consensus(&self, symbol: &str) -> Result<Option<f64>> {
        let entries = self.get_list::<FmpConsensus>(CONSENSUS_PATH, symbol).await?;
        Ok(entries.first().and_then(FmpConsensus::value))
    }
}

#[async_trait::async_trait]
impl AnalystTargetSource for FmpClient {
    async fn get_individual_targets(&self, symbol: &str) -> Result<Vec<f64>> {
        match self.fetch_targets(symbol).await {
            Ok(targets) => Ok(targets),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "analyst targets unavailable");
                Ok(Vec::new())
            }
        }
    }

    async fn get_consensus_target(&self, symbol: &str) -> Result<Option<f64>> {
        match self.fetch_consensus(symbol).await {
            Ok(consensus) => Ok(consensus),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "consensus target unavailable");
                Ok(None)
            }
        }
    }
}
