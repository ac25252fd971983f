//! Payment relay trait definitions
//!
//! The gateway, the transaction-state owner and the event consumer are all
//! external collaborators; these traits are the seams the relay talks through.

use crate::error::AppResult;
use crate::payments::types::{
    GatewayPayload, GatewayRedirect, PaymentEvent, Settlement, TransactionRecord,
};
use async_trait::async_trait;

/// Trait for payment gateway implementations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a transaction to the gateway
    ///
    /// Issues exactly one outbound call and never retries. Network failures
    /// and timeouts surface as `GatewayUnavailable`; a reply without a
    /// redirect URL surfaces as `GatewayProtocol`.
    ///
    /// # Arguments
    /// * `payload` - Complete, validated field set for the initiation call
    ///
    /// # Returns
    /// * `GatewayRedirect` - Browser redirect URL and, for mobile money, a poll URL
    async fn initiate_transaction(&self, payload: &GatewayPayload) -> AppResult<GatewayRedirect>;

    /// Short provider name used in logs
    fn name(&self) -> &'static str;
}

/// Owner of per-transaction state
///
/// The relay only records initiations and applies verified settlements;
/// storage and its consistency rules belong to the implementation.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Record a freshly initiated transaction
    async fn record_initiated(&self, record: TransactionRecord) -> AppResult<()>;

    /// Look up a transaction by reference
    async fn find(&self, reference: &str) -> AppResult<Option<TransactionRecord>>;

    /// Move a transaction to Settled
    ///
    /// Fails with `UnknownReference` when the reference was never recorded
    /// and with `AlreadySettled` when it has settled before.
    async fn settle(&self, reference: &str, settlement: Settlement)
        -> AppResult<TransactionRecord>;
}

/// Receiver of payment lifecycle events
pub trait PaymentEventSink: Send + Sync {
    fn publish(&self, event: PaymentEvent);
}
