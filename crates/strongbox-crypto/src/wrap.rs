//! File key wrapping with RSA-OAEP
//!
//! Wrapped key format: the raw RSA ciphertext, exactly one modulus long
//! (256 bytes for RSA-2048).

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::keypair::{PrivateKey, PublicKey};
use crate::keys::FileKey;
use crate::{KEY_SIZE, MIN_RSA_BITS};

/// OAEP digest used when wrapping a file key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapPadding {
    #[default]
    #[serde(rename = "oaep-sha256")]
    OaepSha256,
    /// OAEP with SHA-1 for both digest and MGF1, as written by the Node service.
    #[serde(rename = "oaep-sha1")]
    OaepSha1,
}

impl WrapPadding {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapPadding::OaepSha256 => "oaep-sha256",
            WrapPadding::OaepSha1 => "oaep-sha1",
        }
    }

    fn digest_len(&self) -> usize {
        match self {
            WrapPadding::OaepSha256 => 32,
            WrapPadding::OaepSha1 => 20,
        }
    }

    fn scheme(&self) -> Oaep {
        match self {
            WrapPadding::OaepSha256 => Oaep::new::<sha2::Sha256>(),
            WrapPadding::OaepSha1 => Oaep::new::<sha1::Sha1>(),
        }
    }
}

impl std::fmt::Display for WrapPadding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WrapPadding {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oaep-sha256" => Ok(WrapPadding::OaepSha256),
            "oaep-sha1" => Ok(WrapPadding::OaepSha1),
            other => Err(CryptoError::Encoding(format!(
                "unknown key wrap padding '{other}' (expected oaep-sha256 or oaep-sha1)"
            ))),
        }
    }
}

/// Largest message RSA-OAEP can carry: `k - 2·hLen - 2` for a `k`-byte modulus.
pub fn max_wrap_payload(modulus_bytes: usize, padding: WrapPadding) -> usize {
    modulus_bytes.saturating_sub(2 * padding.digest_len() + 2)
}

/// Check that an RSA modulus of `bits` can wrap a file key under `padding`.
pub fn check_wrap_capacity(bits: usize, padding: WrapPadding) -> Result<()> {
    if bits < MIN_RSA_BITS {
        return Err(CryptoError::KeySize(format!(
            "RSA modulus of {bits} bits is below the {MIN_RSA_BITS}-bit minimum"
        )));
    }
    let capacity = max_wrap_payload(bits / 8, padding);
    if capacity < KEY_SIZE {
        return Err(CryptoError::KeySize(format!(
            "RSA-{bits} with {padding} carries at most {capacity} bytes, file keys need {KEY_SIZE}"
        )));
    }
    Ok(())
}

/// Wrap (encrypt) a file key under the owner's public key.
pub fn wrap_key(file_key: &FileKey, public: &PublicKey, padding: WrapPadding) -> Result<Vec<u8>> {
    wrap_key_from(&mut OsRng, file_key, public, padding)
}

/// Wrap with an explicit random source for the OAEP seed.
///
/// A failing source yields `Entropy`, never a wrapped key padded with
/// whatever the source left in the seed buffer.
pub fn wrap_key_from<R: RngCore + CryptoRng>(
    rng: &mut R,
    file_key: &FileKey,
    public: &PublicKey,
    padding: WrapPadding,
) -> Result<Vec<u8>> {
    check_wrap_capacity(public.bits(), padding)?;

    let mut seed_rng = SeedRng { inner: rng, failure: None };
    let result = public
        .as_rsa()
        .encrypt(&mut seed_rng, padding.scheme(), file_key.as_bytes());

    if let Some(reason) = seed_rng.failure {
        return Err(CryptoError::Entropy(reason));
    }
    result.map_err(|e| match e {
        rsa::Error::MessageTooLong => {
            CryptoError::KeySize(format!("RSA-OAEP wrap rejected file key: {e}"))
        }
        _ => CryptoError::InvalidKey("public"),
    })
}

/// Feeds the OAEP seed through `try_fill_bytes` and records the first
/// failure, since the padding code only calls the infallible `fill_bytes`.
struct SeedRng<'a, R> {
    inner: &'a mut R,
    failure: Option<String>,
}

impl<R: RngCore> RngCore for SeedRng<'_, R> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill_bytes(dest) {
            dest.zeroize();
            self.failure.get_or_insert_with(|| e.to_string());
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

impl<R: CryptoRng> CryptoRng for SeedRng<'_, R> {}

/// Unwrap (decrypt) a file key with the owner's private key.
///
/// Wrong key, wrong padding, corrupted input and an unexpected key length
/// all produce the same `CryptoError::Unwrap`.
pub fn unwrap_key(wrapped: &[u8], private: &PrivateKey, padding: WrapPadding) -> Result<FileKey> {
    let mut plaintext = private
        .as_rsa()
        .decrypt(padding.scheme(), wrapped)
        .map_err(|_| CryptoError::Unwrap)?;

    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(CryptoError::Unwrap);
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(FileKey::from_bytes(key_bytes))
}
