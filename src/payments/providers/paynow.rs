//! Paynow payment gateway implementation
//!
//! Paynow takes a form-encoded, hash-signed POST on its initiate endpoint and
//! answers with a redirect URL (and a poll URL for mobile-money methods).

use crate::error::{AppResult, PaymentError};
use crate::payments::integrity::{IntegrityScheme, IntegritySigner};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{GatewayPayload, GatewayRedirect};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_INITIATE_URL: &str = "https://www.paynow.co.zw/interface/initiatetransaction";

/// Paynow integration configuration
#[derive(Clone)]
pub struct PaynowConfig {
    pub integration_id: String,
    /// Shared secret; used to sign requests and verify notifications
    pub integration_key: String,
    pub initiate_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub integrity_scheme: IntegrityScheme,
}

impl std::fmt::Debug for PaynowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaynowConfig")
            .field("integration_id", &self.integration_id)
            .field("integration_key", &"<redacted>")
            .field("initiate_url", &self.initiate_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("integrity_scheme", &self.integrity_scheme)
            .finish()
    }
}

impl Default for PaynowConfig {
    fn default() -> Self {
        Self {
            integration_id: String::new(),
            integration_key: String::new(),
            initiate_url: DEFAULT_INITIATE_URL.to_string(),
            timeout_secs: 10,
            integrity_scheme: IntegrityScheme::Sha512,
        }
    }
}

impl PaynowConfig {
    pub fn is_configured(&self) -> bool {
        !self.integration_id.trim().is_empty() && !self.integration_key.trim().is_empty()
    }

    pub fn signer(&self) -> IntegritySigner {
        IntegritySigner::new(self.integrity_scheme, self.integration_key.clone())
    }
}

/// Paynow gateway client
pub struct PaynowGateway {
    config: PaynowConfig,
    client: Client,
    signer: IntegritySigner,
}

impl PaynowGateway {
    pub fn new(config: PaynowConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PaymentError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "Paynow gateway initialized: url={}, timeout={}s",
            config.initiate_url, config.timeout_secs
        );

        let signer = config.signer();
        Ok(Self {
            config,
            client,
            signer,
        })
    }

    /// Signed, form-encoded request body
    fn encode_payload(&self, payload: &GatewayPayload) -> AppResult<String> {
        let mut fields = payload.fields();
        let hash = self
            .signer
            .sign(fields.iter().map(|(name, value)| (*name, value.as_str())))?;
        fields.push(("hash", hash));

        serde_urlencoded::to_string(&fields).map_err(|e| {
            PaymentError::configuration(format!("Failed to encode gateway payload: {}", e))
        })
    }

    fn interpret_reply(&self, reply: &GatewayReply) -> AppResult<GatewayRedirect> {
        if reply
            .get("status")
            .map(|s| s.eq_ignore_ascii_case("error"))
            .unwrap_or(false)
        {
            let detail = reply.get("error").unwrap_or("no error detail");
            error!("Paynow rejected initiation: {}", detail);
            return Err(PaymentError::gateway_protocol(detail));
        }

        if reply.signed {
            if let Some(hash) = reply.get("hash") {
                let verified = self.signer.verify(
                    reply.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    hash,
                );
                if !verified {
                    error!("Paynow initiation reply failed hash verification");
                    return Err(PaymentError::gateway_protocol(
                        "Reply hash does not match integration key",
                    ));
                }
            }
        }

        let redirect_url = reply
            .get("browserurl")
            .or_else(|| reply.get("redirect"))
            .ok_or_else(|| {
                error!("Paynow reply is missing a redirect URL");
                PaymentError::gateway_protocol("Reply is missing browserurl")
            })?;
        let poll_url = reply.get("pollurl").or_else(|| reply.get("poll"));

        Ok(GatewayRedirect {
            redirect_url: redirect_url.to_string(),
            poll_url: poll_url.map(str::to_string),
        })
    }
}

#[async_trait]
impl PaymentGateway for PaynowGateway {
    async fn initiate_transaction(&self, payload: &GatewayPayload) -> AppResult<GatewayRedirect> {
        info!(
            "Initiating Paynow payment: {} {} {}",
            payload.amount, payload.method, payload.reference
        );

        let body = self.encode_payload(payload)?;

        let response = self
            .client
            .post(&self.config.initiate_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Paynow request failed: {}", e);
                PaymentError::from(e)
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            error!("Failed to read Paynow response: {}", e);
            PaymentError::from(e)
        })?;

        if status.is_server_error() {
            warn!("Paynow returned server error {}", status);
            return Err(PaymentError::gateway_unavailable(format!(
                "HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            error!("Paynow API error: HTTP {}: {}", status, response_text);
            return Err(PaymentError::gateway_protocol(format!("HTTP {}", status)));
        }

        let reply = GatewayReply::parse(&response_text)?;
        debug!("Paynow reply fields: {:?}", reply.field_names());

        let redirect = self.interpret_reply(&reply)?;

        info!(
            "Paynow payment initiated successfully: reference={}, polling={}",
            payload.reference,
            redirect.poll_url.is_some()
        );

        Ok(redirect)
    }

    fn name(&self) -> &'static str {
        "Paynow"
    }
}

/// Decoded initiation reply.
///
/// Paynow answers with form-encoded pairs; some deployments proxy it as a
/// JSON object instead. Paynow signs only the form encoding, so only form
/// replies are hash-checked.
#[derive(Debug)]
struct GatewayReply {
    fields: Vec<(String, String)>,
    signed: bool,
}

impl GatewayReply {
    fn parse(body: &str) -> AppResult<Self> {
        let trimmed = body.trim();

        if trimmed.starts_with('{') {
            let object: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(trimmed).map_err(|e| {
                    error!("Failed to parse Paynow response: {}", e);
                    PaymentError::gateway_protocol(format!("Invalid response format: {}", e))
                })?;

            let fields = object
                .into_iter()
                .filter_map(|(key, value)| match value {
                    serde_json::Value::String(s) => Some((key, s)),
                    serde_json::Value::Null => None,
                    other => Some((key, other.to_string())),
                })
                .collect();
            return Ok(Self {
                fields,
                signed: false,
            });
        }

        let fields: Vec<(String, String)> = serde_urlencoded::from_str(trimmed).map_err(|e| {
            error!("Failed to parse Paynow response: {}", e);
            PaymentError::gateway_protocol(format!("Invalid response format: {}", e))
        })?;

        Ok(Self {
            fields,
            signed: true,
        })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }
}
