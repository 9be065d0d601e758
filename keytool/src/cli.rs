//! # CLI Interface
//!
//! Command-line argument structure for `upcx-keytool`, via `clap` derive.
//! Secrets can come from the environment instead of argv, which keeps them
//! out of shell history and `ps`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// UPCX key tool.
///
/// Offline key operations for UPCX accounts, plus local backup and recovery
/// drills against a directory-backed share custodian.
#[derive(Parser, Debug)]
#[command(
    name = "upcx-keytool",
    about = "UPCX key custody tool",
    version,
    propagate_version = true
)]
pub struct KeytoolCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "UPCX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new key, either random or from a fresh mnemonic.
    Generate(GenerateArgs),
    /// Derive a key from a hex seed and index.
    Derive(DeriveArgs),
    /// Show the public key and address behind a WIF.
    Inspect(InspectArgs),
    /// Sign a 32-byte digest, or the SHA-256 of a message.
    Sign(SignArgs),
    /// Recover the signer's address from a signature and digest.
    RecoverPubkey(RecoverPubkeyArgs),
    /// Split a WIF into plaintext threshold shares.
    Split(SplitArgs),
    /// Combine plaintext shares back into a WIF.
    Combine(CombineArgs),
    /// Encrypt and file a key's shares under a local custodian directory.
    Backup(BackupArgs),
    /// Recover a key from a local custodian directory.
    Restore(RestoreArgs),
    /// Print version information and exit.
    Version,
}

/// A WIF private key, from a flag or the environment.
#[derive(Args, Debug)]
pub struct WifArgs {
    /// WIF-encoded private key.
    #[arg(long, env = "UPCX_WIF", hide_env_values = true)]
    pub wif: String,
}

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Generate a BIP-39 mnemonic with this many words (12, 15, 18, 21 or
    /// 24) and derive the key from it, instead of a bare random key.
    #[arg(long)]
    pub mnemonic: Option<usize>,

    /// Optional BIP-39 passphrase, used with `--mnemonic`.
    #[arg(long, env = "UPCX_MNEMONIC_PASSPHRASE", hide_env_values = true, default_value = "")]
    pub passphrase: String,
}

/// Arguments for `derive`.
#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Hex-encoded seed, at least 32 bytes.
    #[arg(long, env = "UPCX_SEED", hide_env_values = true)]
    pub seed: String,

    /// Key index under the seed.
    #[arg(long, default_value_t = 0)]
    pub index: u32,
}

/// Arguments for `inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub key: WifArgs,
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub key: WifArgs,

    /// Hex-encoded 32-byte digest to sign.
    #[arg(long, conflicts_with = "message", required_unless_present = "message")]
    pub digest: Option<String>,

    /// Message to hash with SHA-256 and sign.
    #[arg(long)]
    pub message: Option<String>,
}

/// Arguments for `recover-pubkey`.
#[derive(Args, Debug)]
pub struct RecoverPubkeyArgs {
    /// Hex-encoded 65-byte recoverable signature.
    #[arg(long)]
    pub signature: String,

    /// Hex-encoded 32-byte digest that was signed.
    #[arg(long, conflicts_with = "message", required_unless_present = "message")]
    pub digest: Option<String>,

    /// Message whose SHA-256 was signed.
    #[arg(long)]
    pub message: Option<String>,
}

/// Sharing policy overrides.
#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Coordinator configuration file (JSON).
    #[arg(long, short = 'c', env = "UPCX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Minimum shares needed to recover. Overrides the config file.
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Shares produced. Overrides the config file.
    #[arg(long)]
    pub total: Option<u8>,

    /// Share cipher: `aes256-gcm` or `aes256-cbc-pkcs7`. Overrides the
    /// config file.
    #[arg(long)]
    pub cipher: Option<String>,
}

/// Arguments for `split`.
#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub key: WifArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Arguments for `combine`.
#[derive(Args, Debug)]
pub struct CombineArgs {
    /// Hex-encoded shares, as printed by `split`. Repeat the flag.
    #[arg(long = "share", required = true)]
    pub shares: Vec<String>,
}

/// The sign-in identity whose claims seal the shares.
#[derive(Args, Debug, Clone)]
pub struct ClaimsArgs {
    /// Verified email address.
    #[arg(long, env = "UPCX_EMAIL")]
    pub email: String,

    /// Stable user identifier (`sub`).
    #[arg(long, env = "UPCX_SUBJECT")]
    pub subject: String,

    /// Token issuer (`iss`). Its last path segment names the pool.
    #[arg(long, env = "UPCX_ISSUER")]
    pub issuer: String,

    /// Intended audience (`aud`).
    #[arg(long, env = "UPCX_AUDIENCE")]
    pub audience: String,

    /// Access token presented to the custodian.
    #[arg(long, env = "UPCX_ACCESS_TOKEN", hide_env_values = true, default_value = "local")]
    pub access_token: String,
}

/// Arguments for `backup`.
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Key to back up. A fresh key is generated when omitted.
    #[arg(long, env = "UPCX_WIF", hide_env_values = true)]
    pub wif: Option<String>,

    /// Directory the local custodian keeps pools in.
    #[arg(long, short = 'd', env = "UPCX_CUSTODIAN_DIR", default_value = "./custodian")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub claims: ClaimsArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Arguments for `restore`.
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Directory the local custodian keeps pools in.
    #[arg(long, short = 'd', env = "UPCX_CUSTODIAN_DIR", default_value = "./custodian")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub claims: ClaimsArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}
