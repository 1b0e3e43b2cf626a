//! strongbox-crypto: envelope encryption for files at rest
//!
//! Every stored file gets its own random 256-bit key. The file bytes are
//! encrypted with that key, and the key itself is wrapped under the owner's
//! RSA public key. Only the matching private key can recover it.
//!
//! ```text
//! KeyPair (RSA-2048+, per identity, PEM)
//!   └── FileKey (256-bit random, per file, wrapped with RSA-OAEP)
//!       └── Payload: AES-256-GCM (key=file_key, nonce=random_128bit)
//! ```
//!
//! Seal:  plaintext → generate key + nonce → encrypt payload → wrap key → Envelope
//! Open:  Envelope → unwrap key → decrypt payload → plaintext

pub mod custody;
pub mod envelope;
pub mod error;
pub mod keypair;
pub mod keys;
pub mod payload;
pub mod wrap;

pub use custody::{protect_private_key, KdfParams, ProtectedPrivateKey};
pub use envelope::{open_file, seal_file, Envelope, EnvelopeCodec, EnvelopeMetadata, EnvelopeParams};
pub use error::{CryptoError, Result};
pub use keypair::{issue_default_key_pair, issue_key_pair, KeyPair, KeyPairParams, PrivateKey, PublicKey};
pub use keys::{generate_file_key, generate_nonce, FileKey, FileNonce};
pub use payload::{decrypt_payload, encrypt_payload, CipherSuite};
pub use wrap::{max_wrap_payload, unwrap_key, wrap_key, wrap_key_from, WrapPadding};

/// Size of a per-file key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a payload nonce / IV in bytes (128-bit)
pub const NONCE_SIZE: usize = 16;

/// Size of the AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// AES block size, relevant to the legacy CBC suite
pub const BLOCK_SIZE: usize = 16;

/// Smallest RSA modulus accepted for issuing or wrapping
pub const MIN_RSA_BITS: usize = 2048;

/// Largest RSA modulus accepted for issuing
pub const MAX_RSA_BITS: usize = 4096;

/// Default RSA modulus size for newly issued key pairs
pub const DEFAULT_RSA_BITS: usize = 2048;
