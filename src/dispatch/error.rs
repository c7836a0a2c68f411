#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Rate limited, retry after {retry_after}s.")]
    RateLimited { retry_after: u64 },

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}
