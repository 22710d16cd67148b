// ABOUTME: CLI entry point for the keyfleet binary.
// ABOUTME: Dispatches keygen, deploy, revoke, check, verify-ppk and fingerprint subcommands.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keyfleet_cli::{
    load_config, read_public_key_line, render_batch, render_json, write_key_files,
    ConverterChoice, Overrides,
};
use keyfleet_deploy::{
    DeployConfig, Deployer, Endpoint, OpenSshTransport, RemoteShell, TargetList,
};
use keyfleet_keys::{
    default_comment, fingerprint_sha256, AuthorizedKey, EncodedKeyMaterial, KeyPair, PpkContainer,
    PublicKey,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "keyfleet")]
#[command(about = "Generate SSH keys and deploy them across a fleet")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ~/.config/keyfleet/config.toml)
    #[arg(long, global = true, env = "KEYFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Log to ~/.config/keyfleet/keyfleet.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA key pair with PEM, OpenSSH and PPK outputs
    Keygen {
        /// Modulus size in bits (defaults to default_key_bits from config)
        #[arg(long, env = "KEYFLEET_KEY_BITS")]
        bits: Option<usize>,

        /// Key comment (defaults to the current user)
        #[arg(long)]
        comment: Option<String>,

        /// Directory to write id_rsa, id_rsa.pub and id_rsa.ppk into
        #[arg(long)]
        out: PathBuf,

        /// How to produce the PPK file
        #[arg(long, value_enum, default_value_t = ConverterChoice::Auto, env = "KEYFLEET_CONVERTER")]
        converter: ConverterChoice,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Install a public key on every target
    Deploy(BatchArgs),

    /// Remove a public key from every target
    Revoke(BatchArgs),

    /// Check that a single host accepts a non-interactive login
    Check {
        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = 22)]
        port: u16,

        /// Remote login account
        #[arg(long, env = "KEYFLEET_LOGIN")]
        login: String,

        #[command(flatten)]
        ssh: SshArgs,
    },

    /// Parse a PPK v2 file and verify its MAC
    VerifyPpk {
        file: PathBuf,
    },

    /// Print the SHA-256 fingerprint of a public key file
    Fingerprint {
        file: PathBuf,
    },
}

#[derive(Args)]
struct BatchArgs {
    /// Public key file (authorized_keys line)
    #[arg(long)]
    key: PathBuf,

    /// TOML file with [[targets]] tables
    #[arg(long, env = "KEYFLEET_TARGETS")]
    targets: PathBuf,

    /// Print the batch as JSON
    #[arg(long)]
    json: bool,

    /// Maximum number of hosts contacted at once
    #[arg(long, env = "KEYFLEET_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Per-target deadline in seconds
    #[arg(long, env = "KEYFLEET_TARGET_DEADLINE")]
    target_deadline: Option<u64>,

    /// Deadline for the whole batch in seconds
    #[arg(long, env = "KEYFLEET_BATCH_DEADLINE")]
    batch_deadline: Option<u64>,

    #[command(flatten)]
    ssh: SshArgs,
}

#[derive(Args)]
struct SshArgs {
    /// ssh client binary
    #[arg(long, env = "KEYFLEET_SSH")]
    ssh_binary: Option<String>,

    /// Private key used to log in to targets
    #[arg(long, short = 'i', env = "KEYFLEET_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,
}

#[derive(Clone, Copy)]
enum BatchKind {
    Deploy,
    Revoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if cli.log_file {
        keyfleet_log::init_file("keyfleet");
    } else {
        keyfleet_log::init();
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen {
            bits,
            comment,
            out,
            converter,
            force,
        } => keygen(&config, bits, comment, &out, converter, force),
        Commands::Deploy(args) => run_batch(config, BatchKind::Deploy, args).await,
        Commands::Revoke(args) => run_batch(config, BatchKind::Revoke, args).await,
        Commands::Check {
            host,
            port,
            login,
            ssh,
        } => check(config, Endpoint::new(host, port, login), ssh).await,
        Commands::VerifyPpk { file } => verify_ppk(&file),
        Commands::Fingerprint { file } => fingerprint(&file),
    }
}

fn keygen(
    config: &DeployConfig,
    bits: Option<usize>,
    comment: Option<String>,
    out: &Path,
    converter: ConverterChoice,
    force: bool,
) -> Result<()> {
    let bits = bits.unwrap_or(config.default_key_bits);
    let comment = comment.unwrap_or_else(default_comment);
    let encoder = converter.encoder();

    let key_pair = KeyPair::generate(bits, comment).context("Key generation failed")?;
    let material = EncodedKeyMaterial::encode(&key_pair, &*encoder)
        .with_context(|| format!("Encoding with the {} PPK writer failed", encoder.name()))?;
    let files = write_key_files(out, &material, force)?;

    println!("Private key: {}", files.private_key.display());
    println!("Public key:  {}", files.public_key.display());
    println!("PuTTY key:   {}", files.legacy_container.display());
    println!("{} {} ({} bits)", material.fingerprint(), material.comment(), material.bits());
    Ok(())
}

async fn run_batch(config: DeployConfig, kind: BatchKind, args: BatchArgs) -> Result<()> {
    let config = Overrides {
        ssh_binary: args.ssh.ssh_binary,
        identity_file: args.ssh.identity_file,
        max_concurrency: args.max_concurrency,
        target_deadline_secs: args.target_deadline,
        batch_deadline_secs: args.batch_deadline,
    }
    .apply(config)?;

    let line = read_public_key_line(&args.key)?;
    let targets = TargetList::load(&args.targets)?.targets;

    let deployer = deployer(&config)?;
    let batch = match kind {
        BatchKind::Deploy => deployer.deploy(&line, &targets).await,
        BatchKind::Revoke => deployer.revoke(&line, &targets).await,
    }
    .with_context(|| format!("Refusing to run batch for {}", args.key.display()))?;

    if args.json {
        println!("{}", render_json(&batch)?);
    } else {
        print!("{}", render_batch(&batch));
    }
    Ok(())
}

async fn check(config: DeployConfig, endpoint: Endpoint, ssh: SshArgs) -> Result<()> {
    let config = Overrides {
        ssh_binary: ssh.ssh_binary,
        identity_file: ssh.identity_file,
        ..Overrides::default()
    }
    .apply(config)?;

    deployer(&config)?
        .check(&endpoint)
        .await
        .with_context(|| format!("{endpoint} is not ready for key deployment"))?;
    println!("{endpoint}: reachable");
    Ok(())
}

fn deployer(config: &DeployConfig) -> Result<Deployer> {
    let transport: Arc<dyn RemoteShell> = Arc::new(OpenSshTransport::from_config(config));
    info!(transport = transport.name(), ssh = %config.ssh_binary, "using transport");
    Deployer::new(transport, config.limits()).context("Invalid deploy limits")
}

fn verify_ppk(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let container = PpkContainer::parse(&text)
        .with_context(|| format!("{} is not a PPK v2 file", file.display()))?;
    container
        .verify()
        .with_context(|| format!("{} failed verification", file.display()))?;

    let public_key =
        PublicKey::from_bytes(container.public_blob()).context("Invalid public key blob")?;
    println!(
        "{}: OK {} {} {}",
        file.display(),
        container.key_type(),
        fingerprint_sha256(&public_key)?,
        container.comment()
    );
    Ok(())
}

fn fingerprint(file: &Path) -> Result<()> {
    let line = read_public_key_line(file)?;
    let key = AuthorizedKey::parse(&line)
        .with_context(|| format!("{} is not an authorized-key line", file.display()))?;
    let public_key = key.public_key()?;
    println!(
        "{} {} ({})",
        fingerprint_sha256(&public_key)?,
        key.comment(),
        key.key_type()
    );
    Ok(())
}
