use thiserror::Error;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("places provider returned {status}: {body}")]
    ProviderStatus { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
}
