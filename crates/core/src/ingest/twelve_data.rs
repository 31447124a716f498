use crate::config::Settings;
use crate::domain::quote::Quote;
use crate::ingest::provider::{CandidateSource, QuoteSource};
use crate::ingest::types::{mover_symbols, TwelveDataQuote};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";
const MOVERS_PATH: &str = "/market_movers/stocks";
const QUOTE_PATH: &str = "/quote";

// Used when the ranked movers endpoint is unavailable (it needs a paid plan).
const FALLBACK_SYMBOLS: [&str; 51] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "BRK.B", "V", "JNJ", "WMT", "JPM",
    "MA", "PG", "UNH", "HD", "DIS", "BAC", "ADBE", "NFLX", "NKE", "CMCSA", "PFE", "T", "INTC",
    "CSCO", "XOM", "CVX", "ABBV", "COST", "AVGO", "MRK", "PEP", "TMO", "ACN", "ABT", "DHR", "VZ",
    "ADP", "WFC", "LIN", "BMY", "PM", "NEE", "RTX", "TXN", "HON", "QCOM", "AMGN", "SPGI", "LOW",
];

#[derive(Debug, Clone)]
pub struct TwelveDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_candidates: usize,
}

impl TwelveDataClient {
    pub fn from_settings(
        settings: &Settings,
        timeout: Duration,
        max_candidates: usize,
    ) -> Result<Self> {
        let api_key = settings
            .twelve_data_api_key
            .clone()
            .context("TWELVE_DATA_API_KEY is required")?;
        let base_url = settings
            .twelve_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, api_key, timeout, max_candidates)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        max_candidates: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Twelve Data http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_candidates,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Twelve Data {path} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read Twelve Data {path} response"))?;
        if !status.is_success() {
            anyhow::bail!("Twelve Data {path} HTTP {status}");
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Twelve Data {path} response is not valid JSON"))
    }

    async fn fetch_ranked_movers(&self) -> Result<Option<Vec<String>>> {
        let raw = self.get_json(MOVERS_PATH, &[]).await?;
        let Some(mut symbols) = mover_symbols(&raw) else {
            return Ok(None);
        };
        symbols.truncate(self.max_candidates);
        Ok((!symbols.is_empty()).then_some(symbols))
    }
}

pub fn fallback_symbols() -> Vec<String> {
    FALLBACK_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

#[async_trait::async_trait]
impl CandidateSource for TwelveDataClient {
    fn source_name(&self) -> &'static str {
        "twelve_data"
    }

    async fn list_candidates(&self) -> Result<Vec<String>> {
        match self.fetch_ranked_movers().await {
            Ok(Some(symbols)) => Ok(symbols),
            Ok(None) => {
                tracing::info!("market movers unavailable; using fallback symbol list");
                Ok(fallback_symbols())
            }
            Err(err) => {
                tracing::warn!(error = %err, "market movers fetch failed; using fallback symbol list");
                Ok(fallback_symbols())
            }
        }
    }
}

#[async_trait::async_trait]
impl QuoteSource for TwelveDataClient {
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let raw = self.get_json(QUOTE_PATH, &[("symbol", symbol)]).await?;
        let parsed = serde_json::from_value::<TwelveDataQuote>(raw)
            .context("failed to parse Twelve Data quote")?;

        if parsed.is_error() {
            tracing::debug!(
                %symbol,
                api_message = parsed.message.as_deref().unwrap_or_default(),
                "Twelve Data quote error payload"
            );
            return Ok(None);
        }

        Ok(match (parsed.previous_close(), parsed.last_price()) {
            (Some(prev), Some(last)) => Quote::new(symbol, prev, last),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, max: usize) -> TwelveDataClient {
        TwelveDataClient::new(server.uri(), "td-key", Duration::from_secs(5), max).unwrap()
    }

    #[tokio::test]
    async fn ranked_movers_are_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_movers/stocks"))
            .and(query_param("apikey", "td-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [{"symbol": "AAA"}, {"symbol": "BBB"}, {"symbol": "CCC"}],
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let symbols = client(&server, 2).list_candidates().await.unwrap();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }

    #[tokio::test]
    async fn plan_error_falls_back_to_curated_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_movers/stocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 403,
                "message": "available on Pro plan",
                "status": "error"
            })))
            .mount(&server)
            .await;

        let symbols = client(&server, 50).list_candidates().await.unwrap();
        assert_eq!(symbols.len(), 51);
        assert_eq!(symbols[0], "AAPL");
    }

    #[tokio::test]
    async fn http_failure_and_empty_list_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_movers/stocks"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert_eq!(client(&server, 50).list_candidates().await.unwrap(), fallback_symbols());

        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_movers/stocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&empty)
            .await;
        assert_eq!(client(&empty, 50).list_candidates().await.unwrap(), fallback_symbols());
    }

    #[tokio::test]
    async fn parses_quote_with_string_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "ABC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "ABC",
                "close": "2.18",
                "previous_close": "0.94"
            })))
            .mount(&server)
            .await;

        let q = client(&server, 50).get_quote("ABC").await.unwrap().unwrap();
        assert_eq!(q.symbol, "ABC");
        assert_eq!(q.previous_close, 0.94);
        assert_eq!(q.last_price, 2.18);
    }

    #[tokio::test]
    async fn unusable_quote_is_none_and_http_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "ZERO"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "close": "1.00",
                "previous_close": "0"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "ERR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "symbol not found"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "DOWN"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let c = client(&server, 50);
        assert!(c.get_quote("ZERO").await.unwrap().is_none());
        assert!(c.get_quote("ERR").await.unwrap().is_none());
        assert!(c.get_quote("DOWN").await.is_err());
    }
}
