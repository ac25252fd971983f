//! Result-URL notifications
//!
//! The gateway posts payment results to the result URL at some later time.
//! That endpoint is open to the network, so a notification only counts once
//! its hash verifies against the integration key.

use crate::error::{AppResult, PaymentError};
use crate::payments::integrity::IntegritySigner;
use crate::payments::reference::Reference;
use crate::payments::traits::{PaymentEventSink, TransactionStore};
use crate::payments::types::{
    CallbackNotification, PaymentEvent, Settlement, StatusUpdate, TransactionRecord,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a verified notification did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The transaction moved to Settled
    Settled(TransactionRecord),
    /// Verified, but the gateway still reports a non-terminal status
    Pending { reference: String, status: String },
    /// Verified, but the status is not one the relay maps; no state change
    Unrecognised { reference: String, status: String },
}

pub struct CallbackReceiver {
    signer: IntegritySigner,
    store: Arc<dyn TransactionStore>,
    events: Arc<dyn PaymentEventSink>,
    reference_prefix: String,
}

impl CallbackReceiver {
    pub fn new(
        signer: IntegritySigner,
        store: Arc<dyn TransactionStore>,
        events: Arc<dyn PaymentEventSink>,
        reference_prefix: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            store,
            events,
            reference_prefix: reference_prefix.into(),
        }
    }

    pub async fn handle_callback(
        &self,
        notification: &CallbackNotification,
    ) -> AppResult<CallbackOutcome> {
        let reference = notification
            .reference()
            .ok_or_else(|| PaymentError::malformed_callback("Missing reference"))?;
        let status = notification
            .status()
            .ok_or_else(|| PaymentError::malformed_callback("Missing status"))?;

        if !Reference::has_prefix(reference, &self.reference_prefix) {
            return Err(PaymentError::unknown_reference(reference));
        }

        let hash = notification
            .hash()
            .ok_or_else(|| PaymentError::unverified(reference))?;
        let fields = notification
            .fields()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()));
        if !self.signer.verify(fields, hash) {
            return Err(PaymentError::unverified(reference));
        }

        let Some(update) = StatusUpdate::from_gateway(status) else {
            warn!(
                "Verified callback with unrecognised status: reference={}, status={}",
                reference, status
            );
            return Ok(CallbackOutcome::Unrecognised {
                reference: reference.to_string(),
                status: status.to_string(),
            });
        };

        if self.store.find(reference).await?.is_none() {
            return Err(PaymentError::unknown_reference(reference));
        }

        let outcome = match update {
            StatusUpdate::Pending => {
                debug!(
                    "Verified non-terminal callback: reference={}, status={}",
                    reference, status
                );
                return Ok(CallbackOutcome::Pending {
                    reference: reference.to_string(),
                    status: status.to_string(),
                });
            }
            StatusUpdate::Settled(outcome) => outcome,
        };

        let record = self
            .store
            .settle(
                reference,
                Settlement {
                    outcome,
                    gateway_reference: notification.gateway_reference().map(str::to_string),
                    settled_at: Utc::now(),
                },
            )
            .await?;

        info!(
            "Payment settled: reference={}, outcome={:?}, gateway_reference={:?}",
            record.reference, outcome, record.gateway_reference
        );

        self.events.publish(PaymentEvent::Settled {
            reference: record.reference.clone(),
            outcome,
            gateway_reference: record.gateway_reference.clone(),
            amount: record.amount,
            settled_at: record.settled_at.unwrap_or_else(Utc::now),
        });

        Ok(CallbackOutcome::Settled(record))
    }
}
