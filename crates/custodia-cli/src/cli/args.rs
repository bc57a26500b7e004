use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "custodia",
    version,
    about = "Verify and ingest digital-evidence bundles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify a bundle end to end against an in-memory store, without
    /// writing anything durable.
    Inspect {
        /// Path to the bundle archive.
        bundle: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Verify a bundle and commit it to durable storage plus the ledger.
    Ingest {
        /// Path to the bundle archive.
        bundle: PathBuf,

        /// Store URL: `s3://bucket/prefix`, `file:///path` or `memory://`.
        #[arg(long)]
        store: String,

        /// Path of the local hash-chained ledger file.
        #[arg(long)]
        ledger: PathBuf,

        /// Retention horizon in days for every stored object.
        #[arg(long, default_value_t = 7 * 365)]
        retention_days: i64,

        /// Request GOVERNANCE retention instead of the COMPLIANCE default.
        #[arg(long)]
        governance: bool,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Replay a local ledger file and check its integrity chain.
    LedgerVerify {
        /// Path of the ledger file.
        ledger: PathBuf,
    },
}

#[derive(Args)]
pub struct PolicyArgs {
    /// JSON file with partial extraction-limit overrides.
    #[arg(long, value_name = "FILE")]
    pub limits: Option<PathBuf>,

    /// Accept bundles whose signatures do not verify. The reason is
    /// recorded in every receipt.
    #[arg(long = "allow-unverified-signatures", value_name = "REASON")]
    pub allow_unverified: Option<String>,

    /// Hex fingerprint of an externally trusted signer. Repeatable.
    #[arg(long = "trust", value_name = "FINGERPRINT")]
    pub trusted: Vec<String>,
}
