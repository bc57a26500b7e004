use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use custodia_evidence::store::EvidenceStore;
use custodia_evidence::{
    Bytes, ErrorClass, ExtractLimits, ExtractLimitsOverrides, IngestConfig, IngestError,
    IngestPipeline, IngestReceipt, JsonlLedger, MemoryLedger, MemoryStore, ObjectStoreBackend,
    RetentionMode, RetentionPolicy, SignaturePolicy, StoreSpec,
};

use super::args::{Cli, Command, PolicyArgs};
use crate::exit_codes;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Inspect { bundle, policy } => inspect(&bundle, policy).await,
        Command::Ingest {
            bundle,
            store,
            ledger,
            retention_days,
            governance,
            policy,
        } => {
            ingest(
                &bundle,
                &store,
                &ledger,
                retention_days,
                governance,
                policy,
            )
            .await
        }
        Command::LedgerVerify { ledger } => ledger_verify(&ledger),
    }
}

fn build_config(policy: PolicyArgs) -> anyhow::Result<IngestConfig> {
    let mut limits = ExtractLimits::default();
    if let Some(path) = &policy.limits {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading limit overrides from {}", path.display()))?;
        let overrides: ExtractLimitsOverrides =
            serde_json::from_str(&content).context("parsing limit overrides")?;
        limits = limits.apply(overrides);
    }

    let signatures = match policy.allow_unverified {
        Some(reason) => SignaturePolicy::AcceptUnverified { reason },
        None => SignaturePolicy::Enforce,
    };

    Ok(IngestConfig {
        limits,
        signatures,
        trusted_fingerprints: policy.trusted,
        ..Default::default()
    })
}

fn print_receipt(receipt: &IngestReceipt) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(receipt)?);
    Ok(())
}

fn report_failure(err: &IngestError) -> i32 {
    eprintln!("error: {err}");
    match err.class() {
        ErrorClass::Integrity => exit_codes::REJECTED,
        ErrorClass::Format | ErrorClass::Limits => exit_codes::BAD_BUNDLE,
        _ => exit_codes::INTERNAL,
    }
}

async fn inspect(bundle: &Path, policy: PolicyArgs) -> anyhow::Result<i32> {
    let config = build_config(policy)?;
    let bytes = Bytes::from(
        std::fs::read(bundle).with_context(|| format!("reading {}", bundle.display()))?,
    );

    // A full dry run: same pipeline, throwaway collaborators.
    let pipeline = IngestPipeline::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryLedger::new()),
        config,
    );
    match pipeline.ingest(bytes).await {
        Ok(receipt) => {
            print_receipt(&receipt)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

async fn ingest(
    bundle: &Path,
    store_url: &str,
    ledger_path: &Path,
    retention_days: i64,
    governance: bool,
    policy: PolicyArgs,
) -> anyhow::Result<i32> {
    let mut config = build_config(policy)?;
    config.retention = RetentionPolicy {
        mode: if governance {
            RetentionMode::Governance
        } else {
            RetentionMode::Compliance
        },
        horizon_days: retention_days,
    };

    let spec = StoreSpec::parse(store_url)?;
    let store = ObjectStoreBackend::from_spec(&spec)?;
    if !store.bucket_exists().await? {
        anyhow::bail!("store {store_url} is not reachable");
    }
    let ledger = JsonlLedger::open(ledger_path)?;

    let bytes = Bytes::from(
        std::fs::read(bundle).with_context(|| format!("reading {}", bundle.display()))?,
    );
    let pipeline = IngestPipeline::new(Arc::new(store), Arc::new(ledger), config);
    match pipeline.ingest(bytes).await {
        Ok(receipt) => {
            tracing::info!(
                bundle_sha256 = %receipt.bundle_sha256,
                ledger_tx_id = %receipt.ledger_tx_id,
                "ingestion committed"
            );
            print_receipt(&receipt)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

fn ledger_verify(path: &Path) -> anyhow::Result<i32> {
    let ledger = JsonlLedger::open(path)
        .with_context(|| format!("opening ledger {}", path.display()))?;
    let records = ledger.verify()?;
    println!("ok: {records} record(s), chain verifies");
    Ok(exit_codes::SUCCESS)
}
