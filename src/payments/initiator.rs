//! Payment initiation
//!
//! Validates a client request, builds the gateway payload from it plus the
//! integration credentials and merchant settings, and relays the gateway's
//! redirect back to the caller.

use crate::error::{AppResult, PaymentError};
use crate::payments::reference::Reference;
use crate::payments::traits::{PaymentEventSink, PaymentGateway, TransactionStore};
use crate::payments::types::{
    GatewayPayload, InitiatedPayment, PaymentEvent, PaymentMethod, PaymentRequest,
    TransactionRecord, TransactionStatus,
};
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Integration credentials issued by the gateway
#[derive(Clone)]
pub struct IntegrationCredentials {
    pub integration_id: String,
    pub integration_key: String,
}

impl std::fmt::Debug for IntegrationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationCredentials")
            .field("integration_id", &self.integration_id)
            .finish_non_exhaustive()
    }
}

/// Product-specific fields merged into every payload
#[derive(Debug, Clone)]
pub struct MerchantSettings {
    /// Human-readable text sent as `additionalinfo`
    pub description: String,
    /// Where the gateway sends the payer's browser afterwards
    pub return_url: String,
    /// Where the gateway posts the result notification
    pub result_url: String,
    pub reference_prefix: String,
    pub supported_methods: Vec<PaymentMethod>,
    pub default_method: PaymentMethod,
}

pub struct PaymentInitiator {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn TransactionStore>,
    events: Arc<dyn PaymentEventSink>,
    credentials: IntegrationCredentials,
    merchant: MerchantSettings,
}

impl PaymentInitiator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn TransactionStore>,
        events: Arc<dyn PaymentEventSink>,
        credentials: IntegrationCredentials,
        merchant: MerchantSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            events,
            credentials,
            merchant,
        }
    }

    /// Method used when the client does not name one
    pub fn default_method(&self) -> PaymentMethod {
        self.merchant.default_method
    }

    pub fn merchant(&self) -> &MerchantSettings {
        &self.merchant
    }

    pub fn validate(&self, request: &PaymentRequest) -> AppResult<()> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::invalid_request("Amount must be greater than zero"));
        }
        if request.amount.normalize().scale() > 2 {
            return Err(PaymentError::invalid_request(
                "Amount must have at most two decimal places",
            ));
        }
        if !self.merchant.supported_methods.contains(&request.method) {
            return Err(PaymentError::invalid_request(format!(
                "Payment method '{}' is not supported",
                request.method
            )));
        }
        if !email_pattern().is_match(&request.email) {
            return Err(PaymentError::invalid_request("A valid email address is required"));
        }
        if request.phone.trim().is_empty() {
            return Err(PaymentError::invalid_request("A phone number is required"));
        }
        Ok(())
    }

    /// Merge credentials, a fresh reference, the request and merchant fields.
    pub fn build_payload(&self, request: &PaymentRequest) -> GatewayPayload {
        GatewayPayload {
            integration_id: self.credentials.integration_id.clone(),
            integration_key: self.credentials.integration_key.clone(),
            reference: Reference::generate(
                &self.merchant.reference_prefix,
                &request.email,
                request.amount,
            ),
            amount: request.amount,
            description: self.merchant.description.clone(),
            return_url: self.merchant.return_url.clone(),
            result_url: self.merchant.result_url.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            method: request.method,
        }
    }

    /// Relay one payment to the gateway.
    ///
    /// Exactly one outbound call is made; failures are returned unretried.
    pub async fn initiate(&self, request: PaymentRequest) -> AppResult<InitiatedPayment> {
        self.validate(&request)?;

        let payload = self.build_payload(&request);
        payload.ensure_complete()?;

        let redirect = match self.gateway.initiate_transaction(&payload).await {
            Ok(redirect) => redirect,
            Err(e) => {
                error!(
                    "{} initiation failed: reference={}, error={}",
                    self.gateway.name(),
                    payload.reference,
                    e
                );
                return Err(e);
            }
        };

        if request.method.supports_polling() && redirect.poll_url.is_none() {
            warn!(
                "No poll URL returned for {} payment {}",
                request.method, payload.reference
            );
        }

        let status = if redirect.poll_url.is_some() {
            TransactionStatus::Polling
        } else {
            TransactionStatus::Initiated
        };

        let reference = payload.reference.to_string();
        self.store
            .record_initiated(TransactionRecord {
                reference: reference.clone(),
                method: request.method,
                amount: request.amount,
                email: request.email.clone(),
                poll_url: redirect.poll_url.clone(),
                status,
                gateway_reference: None,
                initiated_at: Utc::now(),
                settled_at: None,
            })
            .await?;

        self.events.publish(PaymentEvent::Initiated {
            reference: reference.clone(),
            method: request.method,
            amount: request.amount,
            poll_url: redirect.poll_url.clone(),
        });

        info!(
            "Payment initiated: reference={}, method={}, status={:?}",
            reference, request.method, status
        );

        Ok(InitiatedPayment {
            redirect_url: redirect.redirect_url,
            poll_url: redirect.poll_url,
            reference,
        })
    }
}
