//! Per-file key and nonce generation

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::{KEY_SIZE, NONCE_SIZE};

/// A per-file 256-bit encryption key. Zeroized on drop.
///
/// Deliberately not `Serialize`: a raw file key never leaves the process.
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 128-bit payload nonce (the IV for the legacy CBC suite). Not secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileNonce {
    bytes: [u8; NONCE_SIZE],
}

impl FileNonce {
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a nonce from a decoded metadata field, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::Encoding(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

/// Generate a random 256-bit file key from the OS random source.
pub fn generate_file_key() -> Result<FileKey> {
    generate_file_key_from(&mut OsRng)
}

/// Generate a random 128-bit nonce from the OS random source.
pub fn generate_nonce() -> Result<FileNonce> {
    generate_nonce_from(&mut OsRng)
}

pub fn generate_file_key_from<R: RngCore + CryptoRng>(rng: &mut R) -> Result<FileKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_secure(rng, &mut bytes)?;
    Ok(FileKey::from_bytes(bytes))
}

pub fn generate_nonce_from<R: RngCore + CryptoRng>(rng: &mut R) -> Result<FileNonce> {
    let mut bytes = [0u8; NONCE_SIZE];
    fill_secure(rng, &mut bytes)?;
    Ok(FileNonce::from_bytes(bytes))
}

/// Fill `buf` from `rng`, surfacing source failure instead of panicking.
pub(crate) fn fill_secure<R: RngCore + CryptoRng>(rng: &mut R, buf: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(buf).map_err(|e| {
        buf.zeroize();
        CryptoError::Entropy(e.to_string())
    })
}
