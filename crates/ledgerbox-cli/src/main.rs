//! Ledgerbox command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Print (and on first use generate) the encryption public key
//! ledgerbox --account alice.near --app chat key show
//!
//! # Seal a message for a peer and open one from a peer
//! ledgerbox --account alice.near --app chat seal --to <bob-key> "hello"
//! ledgerbox --account bob.near --app chat open --from <alice-key> <box>
//!
//! # Access credential handshake
//! ledgerbox --account alice.near --app chat ready
//! ledgerbox --account alice.near --app chat confirm
//! ```

use std::{io::Write, path::PathBuf};

use clap::Parser;
use ledgerbox_cli::{Command, Context, run};
use ledgerbox_core::ClientConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Ledgerbox key and box tool
#[derive(Parser, Debug)]
#[command(name = "ledgerbox")]
#[command(about = "Encrypted per-user ledger storage and messaging")]
#[command(version)]
struct Args {
    /// Path to the local key database
    #[arg(long, default_value = "ledgerbox.redb")]
    store: PathBuf,

    /// Ledger network the access credential belongs to
    #[arg(long, default_value = "testnet")]
    network: String,

    /// Ledger account id
    #[arg(long)]
    account: String,

    /// Application (contract) id
    #[arg(long)]
    app: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so stdout carries only command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!(store = %args.store.display(), "opening key store");
    let config = ClientConfig::new(args.network, args.account, args.app);
    let context = Context::open(&args.store, config)?;

    let mut out = std::io::stdout().lock();
    run(&args.command, &context, &mut out)?;
    out.flush()?;

    Ok(())
}
