use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    Validation(String),

    #[error("no provider registered for channel: {0}")]
    NotRegistered(&'static str),

    #[error("send failed: {0}")]
    Send(String),

    #[error("send operation cancelled: {0}")]
    Cancelled(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// True for errors that should short-circuit the retry loop straight to
    /// the dead-letter queue rather than spend the retry budget.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProviderError::NotRegistered(_) | ProviderError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
