//! Payload encryption: file bytes under a per-file key
//!
//! Two suites share the same 256-bit key and 128-bit nonce:
//!
//! ```text
//! aes-256-gcm  [N bytes: ciphertext][16 bytes: GCM tag]      (default)
//! aes-256-cbc  [N + pad bytes: ciphertext], PKCS#7, nonce=IV (legacy)
//! ```
//!
//! GCM rejects any wrong key, wrong nonce or flipped bit. CBC has no
//! integrity check: a wrong key or nonce is only caught when the PKCS#7
//! padding happens not to validate, otherwise garbage comes back. CBC exists
//! to read envelopes written by the earlier Node service and should not be
//! chosen for new data.

use aes_gcm::aead::{consts::U16, Aead, KeyInit};
use aes_gcm::AesGcm;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::keys::{FileKey, FileNonce};
use crate::{BLOCK_SIZE, TAG_SIZE};

/// AES-256-GCM keyed with the full 128-bit nonce instead of the usual 96.
type Aes256Gcm128 = AesGcm<aes::Aes256, U16>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Symmetric construction used for the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSuite {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "aes-256-cbc")]
    Aes256CbcPkcs7,
}

impl CipherSuite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => "aes-256-gcm",
            CipherSuite::Aes256CbcPkcs7 => "aes-256-cbc",
        }
    }

    /// Whether tampering is detected deterministically.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, CipherSuite::Aes256Gcm)
    }

    /// Ciphertext length for a plaintext of `len` bytes.
    pub fn ciphertext_len(&self, len: usize) -> usize {
        match self {
            CipherSuite::Aes256Gcm => len + TAG_SIZE,
            CipherSuite::Aes256CbcPkcs7 => (len / BLOCK_SIZE + 1) * BLOCK_SIZE,
        }
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CipherSuite {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aes-256-gcm" => Ok(CipherSuite::Aes256Gcm),
            "aes-256-cbc" => Ok(CipherSuite::Aes256CbcPkcs7),
            other => Err(CryptoError::Encoding(format!(
                "unknown payload cipher '{other}' (expected aes-256-gcm or aes-256-cbc)"
            ))),
        }
    }
}

/// Encrypt `plaintext` under `key` and `nonce`.
///
/// The `(key, nonce)` pair must never be reused for a second plaintext.
/// `EnvelopeCodec::seal` guarantees this by generating both itself.
pub fn encrypt_payload(
    suite: CipherSuite,
    plaintext: &[u8],
    key: &FileKey,
    nonce: &FileNonce,
) -> Result<Vec<u8>> {
    let ciphertext = match suite {
        CipherSuite::Aes256Gcm => {
            let cipher = Aes256Gcm128::new(key.as_bytes().into());
            cipher
                .encrypt(nonce.as_bytes().into(), plaintext)
                .map_err(|_| CryptoError::Encoding("payload too large for AES-GCM".into()))?
        }
        CipherSuite::Aes256CbcPkcs7 => {
            Aes256CbcEnc::new(key.as_bytes().into(), nonce.as_bytes().into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        }
    };

    tracing::trace!(%suite, plaintext_len = plaintext.len(), "payload encrypted");
    Ok(ciphertext)
}

/// Decrypt `ciphertext` produced by [`encrypt_payload`] with the same suite.
///
/// Every failure is the same `CryptoError::Decryption`, whether it was a
/// bad tag, bad padding or a truncated ciphertext.
pub fn decrypt_payload(
    suite: CipherSuite,
    ciphertext: &[u8],
    key: &FileKey,
    nonce: &FileNonce,
) -> Result<Vec<u8>> {
    match suite {
        CipherSuite::Aes256Gcm => {
            if ciphertext.len() < TAG_SIZE {
                return Err(CryptoError::Decryption);
            }
            let cipher = Aes256Gcm128::new(key.as_bytes().into());
            cipher
                .decrypt(nonce.as_bytes().into(), ciphertext)
                .map_err(|_| CryptoError::Decryption)
        }
        CipherSuite::Aes256CbcPkcs7 => {
            if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
                return Err(CryptoError::Decryption);
            }
            Aes256CbcDec::new(key.as_bytes().into(), nonce.as_bytes().into())
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| CryptoError::Decryption)
        }
    }
}
