use serde::{Deserialize, Serialize};
use strongbox_crypto::{CipherSuite, EnvelopeParams, KdfParams, WrapPadding};

use crate::error::{StrongboxError, StrongboxResult};

/// Top-level configuration (loaded from strongbox.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongboxConfig {
    pub crypto: CryptoConfig,
    pub custody: CustodyConfig,
    pub log: LogConfig,
}

impl StrongboxConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> StrongboxResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StrongboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, at seal time.
    pub fn validate(&self) -> StrongboxResult<()> {
        self.crypto.envelope_params()?;
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(StrongboxError::Config(format!(
                "log.format must be \"json\" or \"text\", got \"{other}\""
            ))),
        }
    }
}

/// Envelope encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// RSA modulus for newly issued key pairs (default: 2048)
    pub rsa_bits: usize,
    /// Payload cipher: "aes-256-gcm" or "aes-256-cbc" (legacy, unauthenticated)
    pub payload_cipher: String,
    /// File key wrapping: "oaep-sha256" or "oaep-sha1" (legacy)
    pub key_wrap: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            rsa_bits: 2048,
            payload_cipher: CipherSuite::default().as_str().into(),
            key_wrap: WrapPadding::default().as_str().into(),
        }
    }
}

impl CryptoConfig {
    /// Typed, validated envelope parameters. Key-size/padding mismatches
    /// surface here as `KeySize` before any file is sealed.
    pub fn envelope_params(&self) -> StrongboxResult<EnvelopeParams> {
        let params = EnvelopeParams {
            suite: self.payload_cipher.parse()?,
            padding: self.key_wrap.parse()?,
            rsa_bits: self.rsa_bits,
        };
        params.validate()?;

        if !params.suite.is_authenticated() {
            tracing::warn!(
                payload_cipher = %params.suite,
                "payload cipher has no integrity protection; use it only for legacy data"
            );
        }
        Ok(params)
    }
}

/// Private-key custody configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Protect newly issued private keys with a passphrase (default: false)
    pub protect_private_keys: bool,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            protect_private_keys: false,
            argon2_mem_cost_kib: kdf.mem_cost_kib,
            argon2_time_cost: kdf.time_cost,
            argon2_parallelism: kdf.parallelism,
        }
    }
}

impl CustodyConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            mem_cost_kib: self.argon2_mem_cost_kib,
            time_cost: self.argon2_time_cost,
            parallelism: self.argon2_parallelism,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_crypto::CryptoError;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
rsa_bits = 3072
payload_cipher = "aes-256-gcm"
key_wrap = "oaep-sha256"

[custody]
protect_private_keys = true
argon2_mem_cost_kib = 131072
argon2_time_cost = 4
argon2_parallelism = 8

[log]
level = "debug"
format = "json"
"#;
        let config = StrongboxConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.crypto.rsa_bits, 3072);
        assert!(config.custody.protect_private_keys);
        assert_eq!(config.custody.kdf_params().mem_cost_kib, 131072);
        assert_eq!(config.custody.kdf_params().parallelism, 8);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");

        let params = config.crypto.envelope_params().unwrap();
        assert_eq!(params.rsa_bits, 3072);
        assert_eq!(params.suite, CipherSuite::Aes256Gcm);
    }

    #[test]
    fn test_parse_defaults() {
        let config = StrongboxConfig::from_toml_str("").unwrap();

        assert_eq!(config.crypto.rsa_bits, 2048);
        assert_eq!(config.crypto.payload_cipher, "aes-256-gcm");
        assert_eq!(config.crypto.key_wrap, "oaep-sha256");
        assert!(!config.custody.protect_private_keys);
        assert_eq!(config.custody.kdf_params(), KdfParams::default());
        assert_eq!(config.log.level, "info");
        assert_eq!(
            config.crypto.envelope_params().unwrap(),
            EnvelopeParams::default()
        );
    }

    #[test]
    fn test_parse_legacy_config() {
        let toml_str = r#"
[crypto]
payload_cipher = "aes-256-cbc"
key_wrap = "oaep-sha1"
"#;
        let config = StrongboxConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.crypto.envelope_params().unwrap(), EnvelopeParams::legacy());
        // Untouched sections keep their defaults
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_small_rsa_key_rejected_at_load() {
        let result = StrongboxConfig::from_toml_str("[crypto]\nrsa_bits = 1024\n");

        assert!(matches!(
            result,
            Err(StrongboxError::Crypto(CryptoError::KeySize(_)))
        ));
    }

    #[test]
    fn test_unknown_cipher_rejected() {
        let result = StrongboxConfig::from_toml_str("[crypto]\npayload_cipher = \"des\"\n");
        assert!(matches!(
            result,
            Err(StrongboxError::Crypto(CryptoError::Encoding(_)))
        ));
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let result = StrongboxConfig::from_toml_str("[log]\nformat = \"xml\"\n");
        assert!(matches!(result, Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = StrongboxConfig::from_toml_str("[crypto\nrsa_bits = ");
        assert!(matches!(result, Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = StrongboxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = StrongboxConfig::from_toml_str(&toml_str).unwrap();

        assert_eq!(config.crypto.rsa_bits, parsed.crypto.rsa_bits);
        assert_eq!(config.crypto.payload_cipher, parsed.crypto.payload_cipher);
        assert_eq!(config.log.level, parsed.log.level);
    }
}
