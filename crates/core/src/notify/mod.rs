use crate::notify::error::PublishError;

pub mod discord;
pub mod error;
pub mod format;

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Posts `text` and returns the provider's message id.
    async fn post(&self, text: &str) -> Result<String, PublishError>;
}
