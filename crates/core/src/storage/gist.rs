use crate::config::Settings;
use crate::storage::ledger::DailyLedger;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_FILENAME: &str = "state.json";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const CLIENT_USER_AGENT: &str = concat!("moverwatch/", env!("CARGO_PKG_VERSION"));

/// Cross-run home of the [`DailyLedger`]. Last writer wins.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> Result<DailyLedger>;

    async fn save(&self, ledger: &DailyLedger) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct GistLedgerStore {
    http: reqwest::Client,
    base_url: String,
    gist_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
}

impl GistLedgerStore {
    pub fn from_settings(settings: &Settings, timeout: Duration) -> Result<Self> {
        let gist_id = settings.gist_id.clone().context("GIST_ID is required")?;
        let token = settings.require_gh_pat()?.to_string();
        let base_url = settings
            .github_api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, gist_id, token, timeout)
    }

    pub fn new(
        base_url: impl Into<String>,
        gist_id: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build GitHub http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            gist_id: gist_id.into(),
            token: token.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}/gists/{}", self.base_url.trim_end_matches('/'), self.gist_id)
    }

    async fn fetch_gist(&self) -> Result<GistResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(github_headers(&self.token)?)
            .send()
            .await
            .context("gist request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read gist response")?;
        if !status.is_success() {
            anyhow::bail!("gist GET HTTP {status}: {}", truncate(&text, 200));
        }

        serde_json::from_str::<GistResponse>(&text).context("failed to parse gist response")
    }
}

#[async_trait::async_trait]
impl LedgerStore for GistLedgerStore {
    async fn load(&self) -> Result<DailyLedger> {
        let gist = self.fetch_gist().await?;
        let Some(file) = gist.files.into_values().next() else {
            return Ok(DailyLedger::new());
        };
        DailyLedger::from_json(file.content.as_deref().unwrap_or_default())
    }

    async fn save(&self, ledger: &DailyLedger) -> Result<()> {
        // Keep writing to whatever file the gist already has.
        let gist = self.fetch_gist().await?;
        let filename = gist
            .files
            .into_keys()
            .next()
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

        let body = serde_json::json!({
            "files": {
                filename.as_str(): { "content": ledger.to_json_pretty()? }
            }
        });

        let res = self
            .http
            .patch(self.url())
            .headers(github_headers(&self.token)?)
            .json(&body)
            .send()
            .await
            .context("gist update request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("gist PATCH HTTP {status}: {}", truncate(&text, 200));
        }

        tracing::debug!(gist_id = %self.gist_id, %filename, "ledger saved");
        Ok(())
    }
}

/// Creates a private gist holding an empty ledger and returns its id.
pub async fn create_ledger_gist(settings: &Settings, timeout: Duration) -> Result<String> {
    let token = settings.require_gh_pat()?;
    let base_url = settings
        .github_api_base_url
        .as_deref()
        .unwrap_or(DEFAULT_BASE_URL);

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build GitHub http client")?;

    let body = serde_json::json!({
        "description": "moverwatch alert ledger",
        "public": false,
        "files": {
            DEFAULT_FILENAME: { "content": DailyLedger::new().to_json_pretty()? }
        }
    });

    let res = http
        .post(format!("{}/gists", base_url.trim_end_matches('/')))
        .headers(github_headers(token)?)
        .json(&body)
        .send()
        .await
        .context("gist create request failed")?;

    let status = res.status();
    let text = res.text().await.context("failed to read gist create response")?;
    if !status.is_success() {
        anyhow::bail!("gist create HTTP {status}: {}", truncate(&text, 200));
    }

    let gist = serde_json::from_str::<GistResponse>(&text)
        .context("failed to parse gist create response")?;
    anyhow::ensure!(!gist.id.is_empty(), "gist create response has no id");
    Ok(gist.id)
}

fn github_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("token {token}"))?);
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    Ok(headers)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
