//! In-memory ledger fake for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Ledger, LedgerResult};

#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub seq: u64,
    pub key: String,
    pub payload: Value,
    pub tx_id: String,
}

/// Append-only vector behind a mutex. Transaction ids are sequential so
/// tests can assert ordering.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<MemoryRecord>>,
    /// When true, `append` fails. Lets tests prove ledger failures are
    /// never masked as partial success.
    fail_appends: Mutex<bool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self) {
        *self.fail_appends.lock().unwrap() = true;
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, key: &str, payload: Value) -> LedgerResult<String> {
        if *self.fail_appends.lock().unwrap() {
            return Err(super::LedgerError::Unavailable {
                message: "injected append failure".into(),
            });
        }
        let mut records = self.records.lock().unwrap();
        let seq = records.len() as u64;
        let tx_id = format!("tx-{seq:06}");
        records.push(MemoryRecord {
            seq,
            key: key.to_string(),
            payload,
            tx_id: tx_id.clone(),
        });
        Ok(tx_id)
    }

    async fn read(&self, key: &str) -> LedgerResult<Option<Value>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.key == key)
            .map(|r| r.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_read_latest() {
        let ledger = MemoryLedger::new();
        let tx1 = ledger
            .append("evidence:aa", serde_json::json!({"v": 1}))
            .await
            .unwrap();
        let tx2 = ledger
            .append("evidence:aa", serde_json::json!({"v": 2}))
            .await
            .unwrap();
        assert_ne!(tx1, tx2);
        let latest = ledger.read("evidence:aa").await.unwrap().unwrap();
        assert_eq!(latest["v"], 2);
        assert!(ledger.read("evidence:bb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure() {
        let ledger = MemoryLedger::new();
        ledger.fail_appends();
        assert!(ledger
            .append("evidence:aa", serde_json::json!({}))
            .await
            .is_err());
        assert_eq!(ledger.record_count(), 0);
    }
}
