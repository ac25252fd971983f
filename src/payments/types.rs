//! Payment relay types and data structures
//!
//! Request, payload, notification and transaction-state types shared by the
//! initiator, the callback receiver and the gateway provider.

use crate::error::{AppResult, PaymentError};
use crate::payments::reference::Reference;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment methods understood by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Ecocash,
    Onemoney,
    Innbucks,
    Visa,
    Mastercard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Ecocash => "ecocash",
            PaymentMethod::Onemoney => "onemoney",
            PaymentMethod::Innbucks => "innbucks",
            PaymentMethod::Visa => "visa",
            PaymentMethod::Mastercard => "mastercard",
        }
    }

    /// Mobile-money methods complete on the payer's handset, so the gateway
    /// hands back a poll URL alongside the redirect.
    pub fn supports_polling(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Ecocash | PaymentMethod::Onemoney | PaymentMethod::Innbucks
        )
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecocash" => Ok(PaymentMethod::Ecocash),
            "onemoney" => Ok(PaymentMethod::Onemoney),
            "innbucks" => Ok(PaymentMethod::Innbucks),
            "visa" => Ok(PaymentMethod::Visa),
            "mastercard" => Ok(PaymentMethod::Mastercard),
            other => Err(PaymentError::invalid_request(format!(
                "Unsupported payment method '{}'",
                other
            ))),
        }
    }
}

/// Payment request for initiating a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Payer email address, sent to the gateway as `authemail`
    pub email: String,
    /// Mobile number in the format the chosen method expects
    pub phone: String,
    /// Amount in the integration's currency
    pub amount: Decimal,
    pub method: PaymentMethod,
}

/// Fully-resolved field set sent to the gateway's initiation endpoint.
///
/// Built once per request by the initiator and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GatewayPayload {
    pub integration_id: String,
    pub integration_key: String,
    pub reference: Reference,
    pub amount: Decimal,
    pub description: String,
    pub return_url: String,
    pub result_url: String,
    pub email: String,
    pub phone: String,
    pub method: PaymentMethod,
}

impl GatewayPayload {
    /// Every documented field must be present before the call is issued.
    /// Integration and merchant fields are configuration concerns, so a gap
    /// there is reported as a configuration error rather than a bad request.
    pub fn ensure_complete(&self) -> AppResult<()> {
        let configured = [
            ("integration id", &self.integration_id),
            ("integration key", &self.integration_key),
            ("description", &self.description),
            ("return url", &self.return_url),
            ("result url", &self.result_url),
        ];
        for (name, value) in configured {
            if value.trim().is_empty() {
                return Err(PaymentError::configuration(format!(
                    "Gateway {} is not configured",
                    name
                )));
            }
        }

        if self.email.trim().is_empty() || self.phone.trim().is_empty() {
            return Err(PaymentError::invalid_request(
                "Payer email and phone are required",
            ));
        }

        Ok(())
    }

    /// Gateway field names and values in signing order. The `hash` field is
    /// appended by the provider.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.integration_id.clone()),
            ("reference", self.reference.to_string()),
            ("amount", format_amount(self.amount)),
            ("additionalinfo", self.description.clone()),
            ("returnurl", self.return_url.clone()),
            ("resulturl", self.result_url.clone()),
            ("authemail", self.email.clone()),
            ("phone", self.phone.clone()),
            ("method", self.method.as_str().to_string()),
            ("key", self.integration_key.clone()),
        ]
    }
}

/// Two-decimal rendering used on the wire and inside references.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Redirect targets extracted from the gateway's initiation reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRedirect {
    pub redirect_url: String,
    pub poll_url: Option<String>,
}

/// What the client receives after a successful initiation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
    pub reference: String,
}

/// Result-URL notification posted by the gateway.
///
/// Fields are kept in delivery order because the integrity hash is computed
/// over the values in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackNotification {
    fields: Vec<(String, String)>,
}

impl CallbackNotification {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Parse a form-encoded body.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| PaymentError::malformed_callback(format!("Invalid form data: {}", e)))?;

        Self::from_fields(fields)
    }

    /// Parse a JSON object body, keeping member order.
    ///
    /// Strings are taken verbatim, other scalars by their JSON text and
    /// `null` members are dropped. Nested values are rejected.
    pub fn parse_json(body: &[u8]) -> AppResult<Self> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| PaymentError::malformed_callback(format!("Invalid JSON: {}", e)))?;

        let mut fields = Vec::with_capacity(object.len());
        for (key, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => fields.push((key, s)),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(PaymentError::malformed_callback(format!(
                        "Field '{}' is not a scalar",
                        key
                    )));
                }
                other => fields.push((key, other.to_string())),
            }
        }

        Self::from_fields(fields)
    }

    fn from_fields(fields: Vec<(String, String)>) -> AppResult<Self> {
        if fields.is_empty() {
            return Err(PaymentError::malformed_callback("Empty notification"));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Case-insensitive field lookup; blank values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// First present field among `names`
    fn get_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    pub fn reference(&self) -> Option<&str> {
        self.get_any(&["reference", "ref", "rrr"])
    }

    pub fn status(&self) -> Option<&str> {
        self.get_any(&["status", "stat"])
    }

    pub fn hash(&self) -> Option<&str> {
        self.get("hash")
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        self.get_any(&["paynowreference", "txn_id", "transactionid"])
    }

    pub fn amount(&self) -> Option<&str> {
        self.get("amount")
    }
}

/// Final outcome of a payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionOutcome {
    Success,
    Failure,
    Cancelled,
}

/// Interpretation of a gateway status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Terminal status; the transaction settles with this outcome
    Settled(TransactionOutcome),
    /// The gateway is still waiting on the payer
    Pending,
}

impl StatusUpdate {
    pub fn from_gateway(status: &str) -> Option<Self> {
        let update = match status.trim().to_ascii_lowercase().as_str() {
            "paid" | "awaiting delivery" | "delivered" | "ok" => {
                StatusUpdate::Settled(TransactionOutcome::Success)
            }
            "cancelled" => StatusUpdate::Settled(TransactionOutcome::Cancelled),
            "failed" | "disputed" | "refunded" => {
                StatusUpdate::Settled(TransactionOutcome::Failure)
            }
            "created" | "sent" | "awaiting payment" => StatusUpdate::Pending,
            _ => return None,
        };
        Some(update)
    }
}

/// Lifecycle of a single payment attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "outcome", rename_all = "lowercase")]
pub enum TransactionStatus {
    Initiated,
    Polling,
    Settled(TransactionOutcome),
}

impl TransactionStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, TransactionStatus::Settled(_))
    }
}

/// Transaction state as reported to the downstream owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub reference: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub email: String,
    pub poll_url: Option<String>,
    pub status: TransactionStatus,
    pub gateway_reference: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Verified outcome applied to a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: TransactionOutcome,
    pub gateway_reference: Option<String>,
    pub settled_at: DateTime<Utc>,
}

/// Events exposed to whatever system owns transaction state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    Initiated {
        reference: String,
        method: PaymentMethod,
        amount: Decimal,
        poll_url: Option<String>,
    },
    Settled {
        reference: String,
        outcome: TransactionOutcome,
        gateway_reference: Option<String>,
        amount: Decimal,
        settled_at: DateTime<Utc>,
    },
}
