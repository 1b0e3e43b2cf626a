use thiserror::Error;

pub type StrongboxResult<T> = Result<T, StrongboxError>;

#[derive(Debug, Error)]
pub enum StrongboxError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Crypto(#[from] strongbox_crypto::CryptoError),
}
