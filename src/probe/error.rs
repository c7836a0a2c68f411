#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WebDriverError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Failed to parse WebDriver response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("WebDriver error `{error}`: {message}")]
    Api { error: String, message: String },

    #[error("Invalid data from WebDriver: missing field `{field}`.")]
    MissingField { field: String },

    #[error("Screenshot payload is not valid base64: {0}")]
    InvalidScreenshot(#[from] base64::DecodeError),
}
