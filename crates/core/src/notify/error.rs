use reqwest::StatusCode;

const BODY_SNIPPET_CHARS: usize = 200;

/// Terminal failure of the publish stage, with the cause when it can be told.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("HTTP 401 (invalid bot token)")]
    Unauthorized,
    #[error("HTTP 403 (bot lacks permissions)")]
    Forbidden,
    #[error("HTTP 404 (channel not found)")]
    NotFound,
    #[error("HTTP 429 (rate limited)")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request timed out; message may not have been sent")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl PublishError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            other => Self::Http {
                status: other.as_u16(),
                body: body.chars().take(BODY_SNIPPET_CHARS).collect(),
            },
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}
