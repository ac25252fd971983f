//! Payment references
//!
//! A reference correlates one initiation with the gateway's later result
//! notification. Layout: `{PREFIX}_{identity}_{amount}_{millis}_{nonce}`.

use crate::payments::types::format_amount;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_IDENTITY_LEN: usize = 24;
const NONCE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference(String);

impl Reference {
    /// Derive a fresh reference for one payment attempt. The timestamp and
    /// random nonce keep repeated identical requests apart.
    pub fn generate(prefix: &str, email: &str, amount: Decimal) -> Self {
        let identity: String = email
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(MAX_IDENTITY_LEN)
            .collect::<String>()
            .to_ascii_lowercase();
        let amount: String = format_amount(amount)
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let nonce = Uuid::new_v4().simple().to_string();

        Self(format!(
            "{}_{}_{}_{}_{}",
            prefix,
            identity,
            amount,
            Utc::now().timestamp_millis(),
            &nonce[..NONCE_LEN]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a reference string was minted with the given prefix.
    pub fn has_prefix(reference: &str, prefix: &str) -> bool {
        reference
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('_'))
            .unwrap_or(false)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}
