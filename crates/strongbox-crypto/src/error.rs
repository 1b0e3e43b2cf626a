//! Error taxonomy for envelope operations.
//!
//! `Decryption` and `Unwrap` render the same message so a remote observer
//! cannot tell a bad key from a bad payload.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA generation or key encoding failed while issuing a key pair.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The OS random source could not produce bytes.
    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    /// Payload could not be decrypted (wrong key, wrong nonce, padding or tag mismatch).
    #[error("cannot decrypt envelope")]
    Decryption,

    /// Wrapped key could not be recovered with the given private key.
    #[error("cannot decrypt envelope")]
    Unwrap,

    /// The RSA key cannot carry a wrapped file key under the chosen padding.
    #[error("key size error: {0}")]
    KeySize(String),

    /// A PEM key could not be parsed. Carries the key role, never key material.
    #[error("invalid {0} key encoding")]
    InvalidKey(&'static str),

    /// Argon2id rejected its parameters while protecting a private key.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Metadata record is malformed (base64, JSON, field lengths, version).
    #[error("envelope encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
