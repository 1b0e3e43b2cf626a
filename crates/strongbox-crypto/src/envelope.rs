//! Envelope codec: seal a file for its owner, open it again
//!
//! An [`Envelope`] is what the storage layer persists per file. The
//! ciphertext goes to the object store as an opaque blob; the rest travels
//! as an [`EnvelopeMetadata`] record:
//!
//! ```json
//! {"version":1,"suite":"aes-256-gcm","padding":"oaep-sha256",
//!  "wrapped_key":"<base64, one RSA modulus>","nonce":"<base64, 16 bytes>"}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::keypair::{KeyPairParams, PrivateKey, PublicKey};
use crate::keys::{generate_file_key_from, generate_nonce_from, FileNonce};
use crate::payload::{decrypt_payload, encrypt_payload, CipherSuite};
use crate::wrap::{check_wrap_capacity, unwrap_key, wrap_key_from, WrapPadding};
use crate::DEFAULT_RSA_BITS;

/// Current metadata record version
pub const ENVELOPE_VERSION: u32 = 1;

/// One sealed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub nonce: FileNonce,
    pub suite: CipherSuite,
    pub padding: WrapPadding,
}

impl Envelope {
    pub fn wrapped_key_base64(&self) -> String {
        STANDARD.encode(&self.wrapped_key)
    }

    pub fn nonce_base64(&self) -> String {
        STANDARD.encode(self.nonce.as_bytes())
    }

    /// The record to persist next to the ciphertext blob.
    pub fn metadata(&self) -> EnvelopeMetadata {
        EnvelopeMetadata {
            version: ENVELOPE_VERSION,
            suite: self.suite,
            padding: self.padding,
            wrapped_key: self.wrapped_key_base64(),
            nonce: self.nonce_base64(),
        }
    }

    /// Reassemble an envelope from a fetched blob and its metadata record.
    pub fn from_parts(ciphertext: Vec<u8>, metadata: &EnvelopeMetadata) -> Result<Self> {
        if metadata.version != ENVELOPE_VERSION {
            return Err(CryptoError::Encoding(format!(
                "unsupported envelope version {} (expected {ENVELOPE_VERSION})",
                metadata.version
            )));
        }

        let wrapped_key = base64_decode(&metadata.wrapped_key, "wrapped_key")?;
        let nonce = FileNonce::from_slice(&base64_decode(&metadata.nonce, "nonce")?)?;

        Ok(Self {
            ciphertext,
            wrapped_key,
            nonce,
            suite: metadata.suite,
            padding: metadata.padding,
        })
    }
}

/// Persisted envelope fields other than the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub version: u32,
    pub suite: CipherSuite,
    pub padding: WrapPadding,
    /// RSA-wrapped file key (base64)
    pub wrapped_key: String,
    /// Payload nonce / IV (base64)
    pub nonce: String,
}

impl EnvelopeMetadata {
    /// Metadata for a row written by the Node service, which stored only the
    /// base64 `encrypted_aes_key` and `iv` columns (AES-256-CBC, OAEP-SHA1).
    pub fn legacy(encrypted_aes_key: &str, iv: &str) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            suite: CipherSuite::Aes256CbcPkcs7,
            padding: WrapPadding::OaepSha1,
            wrapped_key: encrypted_aes_key.to_owned(),
            nonce: iv.to_owned(),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::Encoding(format!("metadata serialization: {e}")))
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CryptoError::Encoding(format!("metadata deserialization: {e}")))
    }
}

/// Configured envelope parameters, validated before any data is sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParams {
    pub suite: CipherSuite,
    pub padding: WrapPadding,
    /// Modulus size for newly issued key pairs
    pub rsa_bits: usize,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            suite: CipherSuite::default(),
            padding: WrapPadding::default(),
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }
}

impl EnvelopeParams {
    /// Parameters matching envelopes written by the Node service.
    pub fn legacy() -> Self {
        Self {
            suite: CipherSuite::Aes256CbcPkcs7,
            padding: WrapPadding::OaepSha1,
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }

    /// Reject key sizes that cannot be issued or cannot carry a file key.
    pub fn validate(&self) -> Result<()> {
        self.key_pair_params().validate()?;
        check_wrap_capacity(self.rsa_bits, self.padding)
    }

    pub fn key_pair_params(&self) -> KeyPairParams {
        KeyPairParams {
            bits: self.rsa_bits,
        }
    }

    pub fn codec(&self) -> Result<EnvelopeCodec> {
        self.validate()?;
        Ok(EnvelopeCodec {
            suite: self.suite,
            padding: self.padding,
        })
    }
}

/// Seals and opens envelopes. Holds no keys or state, only the choice of
/// constructions, so it is `Copy` and safe to share across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeCodec {
    suite: CipherSuite,
    padding: WrapPadding,
}

impl EnvelopeCodec {
    pub fn new(suite: CipherSuite, padding: WrapPadding) -> Self {
        Self { suite, padding }
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn padding(&self) -> WrapPadding {
        self.padding
    }

    /// Seal `plaintext` for the holder of the PEM-encoded public key.
    pub fn seal(&self, plaintext: &[u8], public_pem: &str) -> Result<Envelope> {
        let public = PublicKey::from_pem(public_pem)?;
        self.seal_with_key(plaintext, &public)
    }

    /// Seal with an already parsed public key.
    ///
    /// The file key and nonce are generated here and never accepted from the
    /// caller, so a `(key, nonce)` pair cannot be used twice.
    pub fn seal_with_key(&self, plaintext: &[u8], public: &PublicKey) -> Result<Envelope> {
        self.seal_with_rng(&mut OsRng, plaintext, public)
    }

    pub(crate) fn seal_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        plaintext: &[u8],
        public: &PublicKey,
    ) -> Result<Envelope> {
        check_wrap_capacity(public.bits(), self.padding)?;

        let file_key = generate_file_key_from(rng)?;
        let nonce = generate_nonce_from(rng)?;

        let ciphertext = encrypt_payload(self.suite, plaintext, &file_key, &nonce)?;
        let wrapped_key = wrap_key_from(rng, &file_key, public, self.padding)?;
        drop(file_key);

        tracing::debug!(
            suite = %self.suite,
            padding = %self.padding,
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "sealed envelope"
        );

        Ok(Envelope {
            ciphertext,
            wrapped_key,
            nonce,
            suite: self.suite,
            padding: self.padding,
        })
    }

    /// Open an envelope with the PEM-encoded private key.
    pub fn open(&self, envelope: &Envelope, private_pem: &str) -> Result<Vec<u8>> {
        let private = PrivateKey::from_pem(private_pem)?;
        self.open_with_key(envelope, &private)
    }

    /// Open with an already parsed private key.
    ///
    /// The suite and padding recorded in the envelope are used. An
    /// unauthenticated CBC envelope is only accepted by a codec that was
    /// itself configured for CBC.
    pub fn open_with_key(&self, envelope: &Envelope, private: &PrivateKey) -> Result<Vec<u8>> {
        if !envelope.suite.is_authenticated() && self.suite.is_authenticated() {
            return Err(CryptoError::Encoding(format!(
                "refusing unauthenticated {} envelope; configure that payload cipher to open it",
                envelope.suite
            )));
        }

        let file_key = unwrap_key(&envelope.wrapped_key, private, envelope.padding)?;
        let plaintext = decrypt_payload(envelope.suite, &envelope.ciphertext, &file_key, &envelope.nonce)?;

        tracing::debug!(
            suite = %envelope.suite,
            plaintext_len = plaintext.len(),
            "opened envelope"
        );

        Ok(plaintext)
    }
}

/// Seal a file with the default codec (AES-256-GCM, RSA-OAEP-SHA256).
pub fn seal_file(plaintext: &[u8], public_pem: &str) -> Result<Envelope> {
    EnvelopeCodec::default().seal(plaintext, public_pem)
}

/// Open an envelope sealed by [`seal_file`].
pub fn open_file(envelope: &Envelope, private_pem: &str) -> Result<Vec<u8>> {
    EnvelopeCodec::default().open(envelope, private_pem)
}

fn base64_decode(s: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Encoding(format!("{field}: base64 decode: {e}")))
}
