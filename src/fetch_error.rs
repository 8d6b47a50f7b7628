#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Location not found by weather provider")]
    NotFound,
    #[error("Weather provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode weather provider response: {0}")]
    Decode(String),
}
