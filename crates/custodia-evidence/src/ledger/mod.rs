//! Append-only, tamper-evident ledger seam.
//!
//! The pipeline consumes the ledger through this contract only; the
//! production backend (an immudb deployment in the original system) stays
//! external. Two implementations ship here: [`MemoryLedger`] for tests
//! and [`JsonlLedger`], a hash-chained local file for CLI use.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use jsonl::JsonlLedger;
pub use memory::MemoryLedger;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors from the ledger collaborator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger backend is unreachable or failing.
    #[error("ledger unavailable: {message}")]
    Unavailable { message: String },

    /// The ledger's own integrity chain does not verify.
    #[error("ledger corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Append-only ledger contract.
///
/// `append` returns a transaction id that anchors the payload's
/// unmodified existence at a point in time. Appending to a key never
/// rewrites earlier records; `read` resolves the latest payload.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, key: &str, payload: Value) -> LedgerResult<String>;

    async fn read(&self, key: &str) -> LedgerResult<Option<Value>>;
}
