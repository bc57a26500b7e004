//! Hash-chained JSONL ledger.
//!
//! One JSON record per line; each record binds the previous record's hash,
//! so any edit to an earlier line breaks every hash after it. This gives
//! local, single-writer tamper evidence for CLI and air-gapped use.
//! Production deployments plug a real ledger service behind the same
//! [`Ledger`](super::Ledger) trait.
//!
//! The transaction id IS the record hash: anchoring a payload and proving
//! its position in the chain are the same value.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Ledger, LedgerError, LedgerResult};
use crate::hash::sha256_hex;

/// Hash of the empty chain, used as `prev` for the first record.
const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChainRecord {
    seq: u64,
    key: String,
    payload: Value,
    prev: String,
    entry_hash: String,
    appended_at: DateTime<Utc>,
}

impl ChainRecord {
    /// Hash input: prev hash, key, canonical payload. `serde_json`
    /// serializes maps in sorted key order, so this is deterministic.
    fn compute_hash(prev: &str, key: &str, payload: &Value) -> LedgerResult<String> {
        let canonical = serde_json::to_string(payload)?;
        Ok(sha256_hex(
            format!("{prev}\n{key}\n{canonical}").as_bytes(),
        ))
    }
}

struct ChainState {
    next_seq: u64,
    head: String,
}

/// File-backed, append-only ledger.
pub struct JsonlLedger {
    path: PathBuf,
    state: Mutex<ChainState>,
}

impl JsonlLedger {
    /// Open (or create) a ledger file, replaying and verifying the chain.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        let records = Self::load(&path)?;
        let state = match records.last() {
            Some(last) => ChainState {
                next_seq: last.seq + 1,
                head: last.entry_hash.clone(),
            },
            None => ChainState {
                next_seq: 0,
                head: GENESIS.to_string(),
            },
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn load(path: &Path) -> LedgerResult<Vec<ChainRecord>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut prev = GENESIS.to_string();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ChainRecord = serde_json::from_str(line)?;
            if record.seq != records.len() as u64 {
                return Err(LedgerError::Corrupt {
                    reason: format!("sequence gap at line {}", lineno + 1),
                });
            }
            if record.prev != prev {
                return Err(LedgerError::Corrupt {
                    reason: format!("broken chain link at line {}", lineno + 1),
                });
            }
            let expected = ChainRecord::compute_hash(&record.prev, &record.key, &record.payload)?;
            if record.entry_hash != expected {
                return Err(LedgerError::Corrupt {
                    reason: format!("record hash mismatch at line {}", lineno + 1),
                });
            }
            prev = record.entry_hash.clone();
            records.push(record);
        }
        Ok(records)
    }

    /// Re-verify the whole chain on disk.
    pub fn verify(&self) -> LedgerResult<usize> {
        Ok(Self::load(&self.path)?.len())
    }
}

#[async_trait]
impl Ledger for JsonlLedger {
    async fn append(&self, key: &str, payload: Value) -> LedgerResult<String> {
        let mut state = self.state.lock().await;

        let entry_hash = ChainRecord::compute_hash(&state.head, key, &payload)?;
        let record = ChainRecord {
            seq: state.next_seq,
            key: key.to_string(),
            payload,
            prev: state.head.clone(),
            entry_hash: entry_hash.clone(),
            appended_at: Utc::now(),
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        state.next_seq += 1;
        state.head = entry_hash.clone();
        Ok(entry_hash)
    }

    async fn read(&self, key: &str) -> LedgerResult<Option<Value>> {
        // Chain files are small enough to replay; the production ledger
        // backend does point reads instead.
        let _guard = self.state.lock().await;
        Ok(Self::load(&self.path)?
            .into_iter()
            .rev()
            .find(|r| r.key == key)
            .map(|r| r.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_read_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = JsonlLedger::open(&path).unwrap();
        let tx1 = ledger
            .append("evidence:aa", serde_json::json!({"n": 1}))
            .await
            .unwrap();
        ledger
            .append("evidence:bb", serde_json::json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(tx1.len(), 64);

        // Reopen replays and verifies the chain.
        let reopened = JsonlLedger::open(&path).unwrap();
        assert_eq!(reopened.verify().unwrap(), 2);
        let payload = reopened.read("evidence:aa").await.unwrap().unwrap();
        assert_eq!(payload["n"], 1);
    }

    #[tokio::test]
    async fn tampering_breaks_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = JsonlLedger::open(&path).unwrap();
        ledger
            .append("evidence:aa", serde_json::json!({"amount": 1}))
            .await
            .unwrap();
        ledger
            .append("evidence:bb", serde_json::json!({"amount": 2}))
            .await
            .unwrap();

        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("\"amount\":1", "\"amount\":9");
        std::fs::write(&path, tampered).unwrap();

        assert!(matches!(
            JsonlLedger::open(&path),
            Err(LedgerError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn chain_binds_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = JsonlLedger::open(&path).unwrap();
        ledger
            .append("k1", serde_json::json!({}))
            .await
            .unwrap();
        ledger
            .append("k2", serde_json::json!({}))
            .await
            .unwrap();

        // Swap the two lines: links no longer match.
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.swap(0, 1);
        std::fs::write(&path, format!("{}\n{}\n", lines[0], lines[1])).unwrap();

        assert!(JsonlLedger::open(&path).is_err());
    }
}
