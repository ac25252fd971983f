//! In-memory transaction state
//!
//! Stands in for the downstream store in the server binary and in tests.
//! Records are bounded: settled ones are kept for a short window so
//! redelivered notifications are recognised, unsettled ones expire after the
//! pending window, and the map never holds more than `capacity` entries.

use crate::error::{AppResult, PaymentError};
use crate::payments::traits::TransactionStore;
use crate::payments::types::{Settlement, TransactionRecord, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Retention limits for the in-memory store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub capacity: usize,
    /// How long an unsettled transaction waits for its notification
    pub pending_ttl: Duration,
    /// How long a settled transaction is kept after settlement
    pub settled_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            pending_ttl: Duration::hours(24),
            settled_ttl: Duration::hours(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    config: StoreConfig,
    records: RwLock<HashMap<String, TransactionRecord>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop every record past its retention window.
    pub async fn prune(&self) -> usize {
        let mut records = self.records.write().await;
        self.prune_expired(&mut records, Utc::now())
    }

    fn expires_at(&self, record: &TransactionRecord) -> DateTime<Utc> {
        match (record.status, record.settled_at) {
            (TransactionStatus::Settled(_), Some(settled_at)) => settled_at + self.config.settled_ttl,
            _ => record.initiated_at + self.config.pending_ttl,
        }
    }

    fn prune_expired(
        &self,
        records: &mut HashMap<String, TransactionRecord>,
        now: DateTime<Utc>,
    ) -> usize {
        let before = records.len();
        records.retain(|_, record| self.expires_at(record) > now);
        let removed = before - records.len();
        if removed > 0 {
            debug!("Pruned {} expired transactions", removed);
        }
        removed
    }

    /// Oldest settled record first, then the oldest unsettled one.
    fn evict_one(&self, records: &mut HashMap<String, TransactionRecord>) {
        let victim = records
            .values()
            .filter(|record| record.status.is_settled())
            .min_by_key(|record| record.settled_at)
            .or_else(|| records.values().min_by_key(|record| record.initiated_at))
            .map(|record| record.reference.clone());

        if let Some(reference) = victim {
            if let Some(record) = records.remove(&reference) {
                if !record.status.is_settled() {
                    warn!(
                        "Store at capacity, evicting unsettled transaction {}",
                        reference
                    );
                }
            }
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn record_initiated(&self, record: TransactionRecord) -> AppResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.reference) {
            warn!("Duplicate transaction reference refused: {}", record.reference);
            return Err(PaymentError::duplicate_reference(record.reference));
        }

        if records.len() >= self.config.capacity {
            self.prune_expired(&mut records, Utc::now());
        }
        while !records.is_empty() && records.len() >= self.config.capacity {
            self.evict_one(&mut records);
        }

        debug!(
            "Recording transaction: reference={}, status={:?}",
            record.reference, record.status
        );
        records.insert(record.reference.clone(), record);
        Ok(())
    }

    async fn find(&self, reference: &str) -> AppResult<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(reference)
            .filter(|record| self.expires_at(record) > Utc::now())
            .cloned())
    }

    async fn settle(
        &self,
        reference: &str,
        settlement: Settlement,
    ) -> AppResult<TransactionRecord> {
        let mut records = self.records.write().await;
        let expired = records
            .get(reference)
            .is_some_and(|record| self.expires_at(record) <= Utc::now());
        if expired {
            records.remove(reference);
        }

        let record = records
            .get_mut(reference)
            .ok_or_else(|| PaymentError::unknown_reference(reference))?;

        if record.status.is_settled() {
            return Err(PaymentError::already_settled(reference));
        }

        record.status = TransactionStatus::Settled(settlement.outcome);
        record.gateway_reference = settlement.gateway_reference;
        record.settled_at = Some(settlement.settled_at);

        Ok(record.clone())
    }
}
