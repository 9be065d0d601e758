// Copyright (c) 2026 UPCX Contributors. MIT License.
// See LICENSE for details.

//! # UPCX Key Tool
//!
//! Entry point for the `upcx-keytool` binary. Parses CLI arguments,
//! initializes logging, and runs one key operation.
//!
//! Offline subcommands never touch the network or the disk:
//!
//! - `generate`, `derive`, `inspect`: make or examine a key
//! - `sign`, `recover-pubkey`: recoverable signatures over digests
//! - `split`, `combine`: plaintext threshold shares, for drills only
//!
//! `backup` and `restore` run the full coordinator against a directory
//! standing in for the share custodian. Point two machines at the same
//! directory and you have a recovery drill.

mod cli;
mod logging;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use zeroize::Zeroizing;

use upcx_custody::crypto::signatures::{recover_public_key, sign};
use upcx_custody::crypto::sha256;
use upcx_custody::identity::recovery::{recover_secret, split_secret, Share};
use upcx_custody::{
    CoordinatorConfig, CustodianSession, FileCustodian, IdentityClaims, KeyPair, MnemonicSeed,
    RecoverableSignature, RecoveryCoordinator, ShareCipher, UpcxAddress,
};

use cli::{ClaimsArgs, Commands, KeytoolCli, PolicyArgs};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KeytoolCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );
    let json = cli.json;

    match cli.command {
        Commands::Generate(args) => generate(args, json),
        Commands::Derive(args) => derive(args, json),
        Commands::Inspect(args) => inspect(args, json),
        Commands::Sign(args) => sign_digest(args, json),
        Commands::RecoverPubkey(args) => recover_pubkey(args, json),
        Commands::Split(args) => split(args, json),
        Commands::Combine(args) => combine(args, json),
        Commands::Backup(args) => backup(args, json).await,
        Commands::Restore(args) => restore(args, json).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What the key-producing subcommands print.
#[derive(Serialize)]
struct KeyReport {
    address: String,
    public_key: String,
    wif: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mnemonic: Option<String>,
}

impl KeyReport {
    fn new(keypair: &KeyPair) -> Self {
        Self {
            address: keypair.upcx_address().to_string(),
            public_key: keypair.public_key_hex(),
            wif: keypair.to_wif(),
            mnemonic: None,
        }
    }

    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        println!("  Address    : {}", self.address);
        println!("  Public key : {}", self.public_key);
        println!("  WIF        : {}", self.wif);
        if let Some(phrase) = &self.mnemonic {
            println!("  Mnemonic   : {}", phrase);
        }
        Ok(())
    }
}

fn print_value<T: Serialize>(label: &str, value: &T, text: &str, json: bool) -> Result<()> {
    if json {
        let mut map = serde_json::Map::new();
        map.insert(label.to_string(), serde_json::to_value(value)?);
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Offline Key Operations
// ---------------------------------------------------------------------------

fn generate(args: cli::GenerateArgs, json: bool) -> Result<()> {
    let report = match args.mnemonic {
        Some(words) => {
            let seed = MnemonicSeed::generate(words).context("failed to generate mnemonic")?;
            let keypair = seed
                .derive_keypair(&args.passphrase, 0)
                .context("failed to derive key from mnemonic")?;
            let mut report = KeyReport::new(&keypair);
            report.mnemonic = Some(seed.phrase().to_string());
            report
        }
        None => KeyReport::new(&KeyPair::generate_random().context("failed to generate key")?),
    };
    tracing::info!(address = %report.address, "key generated");
    report.print(json)
}

fn derive(args: cli::DeriveArgs, json: bool) -> Result<()> {
    let seed = Zeroizing::new(args.seed);
    let keypair = KeyPair::derive_from_seed(&seed, args.index)
        .with_context(|| format!("failed to derive key at index {}", args.index))?;
    KeyReport::new(&keypair).print(json)
}

fn inspect(args: cli::InspectArgs, json: bool) -> Result<()> {
    let keypair = parse_wif(args.key.wif)?;
    KeyReport::new(&keypair).print(json)
}

fn sign_digest(args: cli::SignArgs, json: bool) -> Result<()> {
    let keypair = parse_wif(args.key.wif)?;
    let digest = digest_from(args.digest.as_deref(), args.message.as_deref())?;
    let signature = sign(&keypair, &digest).context("signing failed")?;
    let hex_sig = signature.to_hex();
    print_value("signature", &hex_sig, &hex_sig, json)
}

fn recover_pubkey(args: cli::RecoverPubkeyArgs, json: bool) -> Result<()> {
    let signature = RecoverableSignature::from_hex(&args.signature).context("invalid signature")?;
    let digest = digest_from(args.digest.as_deref(), args.message.as_deref())?;
    let public_key =
        recover_public_key(&signature, &digest).context("could not recover public key")?;
    let address = UpcxAddress::from_public_key(&public_key).to_string();
    print_value("address", &address, &address, json)
}

fn split(args: cli::SplitArgs, json: bool) -> Result<()> {
    let keypair = parse_wif(args.key.wif)?;
    let config = load_config(&args.policy)?;
    let policy = config.policy().context("invalid sharing policy")?;
    let wif = Zeroizing::new(keypair.to_wif());
    let shares: Vec<String> = split_secret(wif.as_bytes(), &policy)
        .context("failed to split key")?
        .iter()
        .map(Share::to_string)
        .collect();

    tracing::warn!(
        threshold = policy.threshold,
        total = policy.total_shares,
        "printing plaintext shares; any {} of them reveal the key",
        policy.threshold
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "shares": shares }))?);
    } else {
        for share in &shares {
            println!("{}", share);
        }
    }
    Ok(())
}

fn combine(args: cli::CombineArgs, json: bool) -> Result<()> {
    let shares = args
        .shares
        .iter()
        .enumerate()
        .map(|(i, s)| {
            s.parse::<Share>()
                .with_context(|| format!("share #{} is not valid", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;
    let secret = recover_secret(&shares).context("failed to combine shares")?;
    let wif = std::str::from_utf8(&secret).context("combined secret is not a WIF")?;
    let keypair = KeyPair::from_wif(wif).context("combined secret is not a valid WIF")?;
    KeyReport::new(&keypair).print(json)
}

// ---------------------------------------------------------------------------
// Backup and Restore
// ---------------------------------------------------------------------------

async fn backup(args: cli::BackupArgs, json: bool) -> Result<()> {
    let config = load_config(&args.policy)?;
    let claims = claims_from(&args.claims);
    let session = CustodianSession::for_claims(args.claims.access_token.clone(), &claims);
    let coordinator = RecoveryCoordinator::new(FileCustodian::new(&args.dir), config)
        .context("invalid coordinator configuration")?;

    let (keypair, receipt) = match args.wif {
        Some(wif) => {
            let keypair = parse_wif(wif)?;
            let receipt = coordinator
                .backup(&keypair, &claims, &session)
                .await
                .context("backup failed")?;
            (keypair, receipt)
        }
        None => coordinator
            .backup_new_key(&claims, &session)
            .await
            .context("backup failed")?,
    };

    tracing::info!(
        dir = %args.dir.display(),
        pool = %receipt.pool_id,
        address = %keypair.upcx_address(),
        "backup complete"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        println!("Backup stored.");
        println!("  Operation  : {}", receipt.operation_id);
        println!("  Pool       : {}", receipt.pool_id);
        println!("  Shares     : {} (any {} recover)", receipt.share_count, receipt.threshold);
        println!("  Address    : {}", receipt.public_address);
        println!("  Stored at  : {}", receipt.stored_at.to_rfc3339());
    }
    Ok(())
}

async fn restore(args: cli::RestoreArgs, json: bool) -> Result<()> {
    let config = load_config(&args.policy)?;
    let claims = claims_from(&args.claims);
    let session = CustodianSession::for_claims(args.claims.access_token.clone(), &claims);
    let coordinator = RecoveryCoordinator::new(FileCustodian::new(&args.dir), config)
        .context("invalid coordinator configuration")?;

    let keypair = coordinator
        .recover(&claims, &session)
        .await
        .with_context(|| format!("could not restore key from {}", args.dir.display()))?;
    KeyReport::new(&keypair).print(json)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_wif(wif: String) -> Result<KeyPair> {
    let wif = Zeroizing::new(wif);
    KeyPair::from_wif(&wif).context("invalid WIF private key")
}

fn claims_from(args: &ClaimsArgs) -> IdentityClaims {
    IdentityClaims::new(&args.subject, &args.email, &args.issuer, &args.audience)
}

/// A 32-byte digest from hex, or the SHA-256 of a message.
fn digest_from(digest_hex: Option<&str>, message: Option<&str>) -> Result<[u8; 32]> {
    match (digest_hex, message) {
        (Some(hex_str), _) => {
            let bytes = hex::decode(hex_str.trim_start_matches("0x")).context("digest is not hex")?;
            let len = bytes.len();
            bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("digest must be 32 bytes, got {}", len))
        }
        (None, Some(message)) => Ok(sha256(message.as_bytes())),
        (None, None) => bail!("either --digest or --message is required"),
    }
}

/// Coordinator config from the optional JSON file, with flag overrides.
fn load_config(args: &PolicyArgs) -> Result<CoordinatorConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(total) = args.total {
        config.total_shares = total;
    }
    if let Some(cipher) = &args.cipher {
        config.cipher = cipher
            .parse::<ShareCipher>()
            .with_context(|| format!("unknown cipher '{}'", cipher))?;
    }
    config.policy().context("invalid sharing policy")?;
    tracing::debug!(?config, "coordinator config loaded");
    Ok(config)
}

fn read_config(path: &Path) -> Result<CoordinatorConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("upcx-keytool {}", env!("CARGO_PKG_VERSION"));
    println!("share format {}", upcx_custody::config::SHARE_FORMAT_VERSION);
}
