use crate::config::Settings;
use crate::notify::error::PublishError;
use crate::notify::Publisher;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

#[derive(Debug, Clone)]
pub struct DiscordPublisher {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    channel_id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    id: String,
}

impl DiscordPublisher {
    pub fn from_settings(settings: &Settings, timeout: Duration) -> anyhow::Result<Self> {
        let bot_token = settings.require_discord_bot_token()?.to_string();
        let channel_id = settings.require_discord_channel_id()?.to_string();
        let base_url = settings
            .discord_api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, bot_token, channel_id, timeout)
    }

    pub fn new(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        channel_id: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Discord http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/channels/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.channel_id
        )
    }

    fn headers(&self) -> Result<HeaderMap, PublishError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", self.bot_token))
            .map_err(|_| PublishError::Unauthorized)?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Reads the message back by id. Only ever warns.
    async fn verify(&self, message_id: &str) {
        let url = format!("{}/{}", self.messages_url(), message_id);
        let headers = match self.headers() {
            Ok(h) => h,
            Err(_) => return,
        };

        let res = match self.http.get(url).headers(headers).send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(%message_id, error = %err, "could not verify posted message");
                return;
            }
        };

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%message_id, http_status = %status, "could not verify posted message");
            return;
        }

        match res.json::<MessageResponse>().await {
            Ok(m) if m.id == message_id => {
                tracing::info!(%message_id, "verified message in channel");
            }
            Ok(m) => {
                tracing::warn!(%message_id, returned_id = %m.id, "message verification returned a different id");
            }
            Err(err) => {
                tracing::warn!(%message_id, error = %err, "could not verify posted message");
            }
        }
    }
}

#[async_trait::async_trait]
impl Publisher for DiscordPublisher {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn post(&self, text: &str) -> Result<String, PublishError> {
        let res = self
            .http
            .post(self.messages_url())
            .headers(self.headers()?)
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(|e| PublishError::from_reqwest(&e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| PublishError::from_reqwest(&e))?;
        if !status.is_success() {
            return Err(PublishError::from_status(status, &body));
        }

        let message = serde_json::from_str::<MessageResponse>(&body)
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;
        if message.id.is_empty() {
            return Err(PublishError::InvalidResponse(
                "response has no message id".to_string(),
            ));
        }

        self.verify(&message.id).await;
        Ok(message.id)
    }
}
