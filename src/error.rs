use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("connectivity check failed: {0}")]
    Connectivity(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("API request failed: {0}")]
    Api(String),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
