//! strongbox: seal and open files with per-user envelope encryption
//!
//! Commands:
//!   keygen --out-dir <dir>                         - issue an RSA key pair
//!   seal <input> --public-key <pem> --out <blob>   - write blob + <blob>.meta.json
//!   open <blob> --private-key <key> --out <file>   - recover the original bytes
//!   config show                                    - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use strongbox_core::StrongboxConfig;
use strongbox_crypto::wrap::check_wrap_capacity;
use strongbox_crypto::{
    issue_key_pair, protect_private_key, Envelope, EnvelopeMetadata, EnvelopeParams,
    KeyPairParams, ProtectedPrivateKey,
};

const PASSPHRASE_ENV: &str = "STRONGBOX_PASSPHRASE";

const PUBLIC_KEY_FILE: &str = "public.pem";
const PRIVATE_KEY_FILE: &str = "private.pem";
const PROTECTED_KEY_FILE: &str = "private.key.json";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "strongbox",
    version,
    about = "Envelope encryption for stored files",
    long_about = "strongbox: issue RSA key pairs and seal/open files with per-file AES keys"
)]
struct Cli {
    /// Path to strongbox.toml configuration file
    #[arg(long, short = 'c', env = "STRONGBOX_CONFIG", default_value = "strongbox.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "STRONGBOX_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "STRONGBOX_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue a new RSA key pair for an identity
    Keygen {
        /// Directory to write public.pem and the private key into; must not
        /// already hold a key pair
        #[arg(long)]
        out_dir: PathBuf,
        /// RSA modulus size (overrides [crypto] rsa_bits)
        #[arg(long)]
        bits: Option<usize>,
        /// Protect the private key with a passphrase (also enabled by [custody])
        #[arg(long)]
        protect: bool,
    },

    /// Encrypt a file for the holder of a public key
    Seal {
        /// Plaintext file
        input: PathBuf,
        /// Owner's public key (PEM)
        #[arg(long)]
        public_key: PathBuf,
        /// Ciphertext blob to write; metadata goes to <out>.meta.json
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Decrypt a sealed blob with the owner's private key
    Open {
        /// Ciphertext blob
        blob: PathBuf,
        /// Private key: PEM, or a passphrase-protected key JSON
        #[arg(long)]
        private_key: PathBuf,
        /// Where to write the recovered plaintext
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Metadata record (default: <blob>.meta.json)
        #[arg(long)]
        meta: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !found {
        warn!("config file not found: {}  (using defaults)", cli.config.display());
    }

    let params = config
        .crypto
        .envelope_params()
        .context("invalid [crypto] configuration")?;

    match cli.command {
        Commands::Keygen { out_dir, bits, protect } => {
            cmd_keygen(&config, &params, &out_dir, bits, protect).await
        }
        Commands::Seal { input, public_key, out } => {
            cmd_seal(&params, &input, &public_key, &out).await
        }
        Commands::Open { blob, private_key, out, meta } => {
            cmd_open(&params, &blob, &private_key, &out, meta.as_deref()).await
        }
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &cli.config, found)
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Load the config file, returning defaults (and `false`) when it is absent.
async fn load_config(path: &Path) -> Result<(StrongboxConfig, bool)> {
    if !path.exists() {
        return Ok((StrongboxConfig::default(), false));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config = StrongboxConfig::from_toml_str(&content)
        .with_context(|| format!("parsing config: {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── `strongbox keygen` ────────────────────────────────────────────────────────

async fn cmd_keygen(
    config: &StrongboxConfig,
    params: &EnvelopeParams,
    out_dir: &Path,
    bits: Option<usize>,
    protect: bool,
) -> Result<()> {
    let key_params = KeyPairParams {
        bits: bits.unwrap_or(params.rsa_bits),
    };
    key_params.validate()?;
    check_wrap_capacity(key_params.bits, params.padding)?;

    // Envelopes sealed for an existing pair would become unrecoverable
    for name in [PUBLIC_KEY_FILE, PRIVATE_KEY_FILE, PROTECTED_KEY_FILE] {
        let existing = out_dir.join(name);
        if existing.exists() {
            anyhow::bail!(
                "{} already exists; key pairs are never replaced in place",
                existing.display()
            );
        }
    }

    // Ask before the slow part so a mistyped confirmation fails fast
    let passphrase = if protect || config.custody.protect_private_keys {
        Some(read_passphrase(true)?)
    } else {
        None
    };

    info!(bits = key_params.bits, "generating RSA key pair");
    let pair = tokio::task::spawn_blocking(move || issue_key_pair(&key_params))
        .await
        .context("key generation task failed")?
        .context("issuing key pair")?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let public_path = out_dir.join(PUBLIC_KEY_FILE);
    write_new(&public_path, pair.public_pem.as_bytes(), 0o644).await?;

    let private_pem = pair.private_pem;
    let private_path = match passphrase {
        Some(passphrase) => {
            let kdf = config.custody.kdf_params();
            let protected = tokio::task::spawn_blocking(move || {
                protect_private_key(&private_pem, &passphrase, &kdf)
            })
            .await
            .context("key protection task failed")?
            .context("protecting private key")?;

            let path = out_dir.join(PROTECTED_KEY_FILE);
            write_new(&path, &protected.to_bytes()?, 0o600).await?;
            path
        }
        None => {
            let path = out_dir.join(PRIVATE_KEY_FILE);
            write_new(&path, private_pem.expose_secret().as_bytes(), 0o600).await?;
            path
        }
    };

    println!("Issued RSA-{} key pair", key_params.bits);
    println!("  public:  {}", public_path.display());
    println!("  private: {}", private_path.display());
    Ok(())
}

/// Create `path` with `mode` (unix) and write `contents`. Fails if the file
/// already exists. The mode applies from creation onward.
async fn write_new(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("syncing {}", path.display()))?;
    Ok(())
}

// ── `strongbox seal` ──────────────────────────────────────────────────────────

async fn cmd_seal(params: &EnvelopeParams, input: &Path, public_key: &Path, out: &Path) -> Result<()> {
    let codec = params.codec()?;
    let public_pem = tokio::fs::read_to_string(public_key)
        .await
        .with_context(|| format!("reading public key: {}", public_key.display()))?;
    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let plaintext_len = plaintext.len();

    let envelope = tokio::task::spawn_blocking(move || codec.seal(&plaintext, &public_pem))
        .await
        .context("seal task failed")?
        .with_context(|| format!("sealing {}", input.display()))?;

    let meta_path = sidecar_path(out);
    let metadata = envelope.metadata().to_bytes()?;
    tokio::fs::write(out, &envelope.ciphertext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    // A blob without its metadata can never be opened
    if let Err(e) = tokio::fs::write(&meta_path, &metadata).await {
        if let Err(cleanup) = tokio::fs::remove_file(out).await {
            warn!(blob = %out.display(), error = %cleanup, "failed to remove orphaned blob");
        }
        return Err(e).with_context(|| format!("writing {}", meta_path.display()));
    }

    info!(
        input = %input.display(),
        suite = %envelope.suite,
        bytes = plaintext_len,
        "sealed file"
    );
    println!("Sealed {} → {}", input.display(), out.display());
    println!("  suite:    {} / {}", envelope.suite, envelope.padding);
    println!("  bytes:    {} → {}", plaintext_len, envelope.ciphertext.len());
    println!("  metadata: {}", meta_path.display());
    Ok(())
}

// ── `strongbox open` ──────────────────────────────────────────────────────────

async fn cmd_open(
    params: &EnvelopeParams,
    blob: &Path,
    private_key: &Path,
    out: &Path,
    meta: Option<&Path>,
) -> Result<()> {
    let codec = params.codec()?;
    let meta_path = meta.map(Path::to_path_buf).unwrap_or_else(|| sidecar_path(blob));

    let metadata_bytes = tokio::fs::read(&meta_path)
        .await
        .with_context(|| format!("reading metadata: {}", meta_path.display()))?;
    let metadata = EnvelopeMetadata::from_bytes(&metadata_bytes)?;
    let ciphertext = tokio::fs::read(blob)
        .await
        .with_context(|| format!("reading {}", blob.display()))?;
    let envelope = Envelope::from_parts(ciphertext, &metadata)?;

    let private_pem = load_private_key(private_key).await?;

    let plaintext =
        tokio::task::spawn_blocking(move || codec.open(&envelope, private_pem.expose_secret()))
            .await
            .context("open task failed")?
            .with_context(|| format!("opening {}", blob.display()))?;

    tokio::fs::write(out, &plaintext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    info!(blob = %blob.display(), bytes = plaintext.len(), "opened file");
    println!("Opened {} → {} ({} bytes)", blob.display(), out.display(), plaintext.len());
    Ok(())
}

/// Read a private key file, recovering it first if it is passphrase-protected.
async fn load_private_key(path: &Path) -> Result<SecretString> {
    let content = SecretString::from(
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading private key: {}", path.display()))?,
    );

    if !is_protected_key(content.expose_secret()) {
        return Ok(content);
    }

    let protected = ProtectedPrivateKey::from_bytes(content.expose_secret().as_bytes())?;
    let passphrase = read_passphrase(false)?;
    let pem = tokio::task::spawn_blocking(move || protected.recover(&passphrase))
        .await
        .context("key recovery task failed")?
        .context("recovering protected private key")?;
    Ok(pem)
}

// ── `strongbox config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &StrongboxConfig, config_path: &Path, found: bool) -> Result<()> {
    if found {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `<blob>.meta.json` next to the blob
fn sidecar_path(blob: &Path) -> PathBuf {
    let mut name = blob.file_name().unwrap_or_default().to_os_string();
    name.push(".meta.json");
    blob.with_file_name(name)
}

fn is_protected_key(content: &str) -> bool {
    content.trim_start().starts_with('{')
}

/// Passphrase from $STRONGBOX_PASSPHRASE, or an interactive prompt.
fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        if !value.is_empty() {
            return Ok(SecretString::from(value));
        }
    }

    let first = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    if first.expose_secret().is_empty() {
        anyhow::bail!("empty passphrase");
    }
    if confirm {
        let second = rpassword::prompt_password("Confirm passphrase: ")
            .context("reading passphrase confirmation")?;
        if second != first.expose_secret() {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(first)
}
