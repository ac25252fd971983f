use crate::payments::integrity::IntegrityScheme;
use crate::payments::providers::paynow::{PaynowConfig, DEFAULT_INITIATE_URL};
use crate::payments::store::StoreConfig;
use crate::payments::types::PaymentMethod;
use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub paynow: PaynowConfig,
    pub merchant: MerchantConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct MerchantConfig {
    pub public_base_url: String,
    pub return_url: String,
    pub result_url: String,
    pub description: String,
    pub reference_prefix: String,
    pub supported_methods: Vec<PaymentMethod>,
    pub default_method: PaymentMethod,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).context(format!("{} not set", key));
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server = ServerConfig {
            host: var_or("HOST", "0.0.0.0"),
            port: var("PORT")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: var_or("ENVIRONMENT", "development"),
        };

        let paynow = PaynowConfig {
            integration_id: var("PAYNOW_INTEGRATION_ID")?,
            integration_key: var("PAYNOW_INTEGRATION_KEY")?,
            initiate_url: var_or("PAYNOW_INITIATE_URL", DEFAULT_INITIATE_URL),
            timeout_secs: var_or("PAYNOW_TIMEOUT_SECS", "10")
                .parse()
                .context("PAYNOW_TIMEOUT_SECS must be a valid number")?,
            integrity_scheme: var_or("PAYNOW_INTEGRITY_SCHEME", "sha512")
                .parse::<IntegrityScheme>()
                .map_err(|e| anyhow!(e))?,
        };

        let public_base_url = var("PUBLIC_BASE_URL")?.trim_end_matches('/').to_string();

        let supported_methods = var_or(
            "PAYNOW_SUPPORTED_METHODS",
            "ecocash,onemoney,visa,mastercard",
        )
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PaymentMethod>()
                .map_err(|_| anyhow!("PAYNOW_SUPPORTED_METHODS contains unknown method '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;

        let default_method = var_or("PAYNOW_DEFAULT_METHOD", "ecocash")
            .parse::<PaymentMethod>()
            .map_err(|_| anyhow!("PAYNOW_DEFAULT_METHOD is not a known payment method"))?;

        let merchant = MerchantConfig {
            return_url: lookup("PAYNOW_RETURN_URL")
                .unwrap_or_else(|| format!("{}/payment/return", public_base_url)),
            result_url: lookup("PAYNOW_RESULT_URL")
                .unwrap_or_else(|| format!("{}/api/pay/callback", public_base_url)),
            public_base_url,
            description: var_or("PAYMENT_DESCRIPTION", "Payment"),
            reference_prefix: var_or("PAYMENT_REFERENCE_PREFIX", "PAY"),
            supported_methods,
            default_method,
        };

        let seconds_or = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(v) => {
                    let secs: i64 = v
                        .parse()
                        .with_context(|| format!("{} must be a valid number", key))?;
                    Duration::try_seconds(secs).with_context(|| format!("{} is out of range", key))
                }
                None => Ok(default),
            }
        };

        let defaults = StoreConfig::default();
        let store = StoreConfig {
            capacity: match lookup("TRANSACTION_STORE_CAPACITY") {
                Some(v) => v
                    .parse()
                    .context("TRANSACTION_STORE_CAPACITY must be a valid number")?,
                None => defaults.capacity,
            },
            pending_ttl: seconds_or("TRANSACTION_PENDING_TTL_SECS", defaults.pending_ttl)?,
            settled_ttl: seconds_or("TRANSACTION_SETTLED_TTL_SECS", defaults.settled_ttl)?,
        };

        let config = Config {
            server,
            paynow,
            merchant,
            store,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate port range
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.paynow.integration_id.trim().is_empty() {
            return Err(anyhow!("PAYNOW_INTEGRATION_ID cannot be empty"));
        }

        if self.paynow.integration_key.trim().is_empty() {
            return Err(anyhow!("PAYNOW_INTEGRATION_KEY cannot be empty"));
        }

        if !is_http_url(&self.paynow.initiate_url) {
            return Err(anyhow!(
                "PAYNOW_INITIATE_URL must be an http(s) URL, got {}",
                self.paynow.initiate_url
            ));
        }

        if !(1..=120).contains(&self.paynow.timeout_secs) {
            return Err(anyhow!(
                "PAYNOW_TIMEOUT_SECS must be between 1 and 120, got {}",
                self.paynow.timeout_secs
            ));
        }

        for (name, url) in [
            ("PUBLIC_BASE_URL", &self.merchant.public_base_url),
            ("PAYNOW_RETURN_URL", &self.merchant.return_url),
            ("PAYNOW_RESULT_URL", &self.merchant.result_url),
        ] {
            if !is_http_url(url) {
                return Err(anyhow!("{} must be an http(s) URL, got {}", name, url));
            }
        }

        if self.server.environment == "production"
            && !self.merchant.result_url.starts_with("https://")
        {
            return Err(anyhow!("PAYNOW_RESULT_URL must use https in production"));
        }

        if self.merchant.description.trim().is_empty() {
            return Err(anyhow!("PAYMENT_DESCRIPTION cannot be empty"));
        }

        let prefix = &self.merchant.reference_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!(
                "PAYMENT_REFERENCE_PREFIX must be non-empty and alphanumeric, got '{}'",
                prefix
            ));
        }

        if self.merchant.supported_methods.is_empty() {
            return Err(anyhow!(
                "PAYNOW_SUPPORTED_METHODS must contain at least one method"
            ));
        }

        if !self
            .merchant
            .supported_methods
            .contains(&self.merchant.default_method)
        {
            return Err(anyhow!(
                "PAYNOW_DEFAULT_METHOD '{}' is not in PAYNOW_SUPPORTED_METHODS",
                self.merchant.default_method
            ));
        }

        if self.store.capacity == 0 {
            return Err(anyhow!("TRANSACTION_STORE_CAPACITY must be at least 1"));
        }

        if self.store.pending_ttl <= Duration::zero() || self.store.settled_ttl <= Duration::zero()
        {
            return Err(anyhow!(
                "TRANSACTION_PENDING_TTL_SECS and TRANSACTION_SETTLED_TTL_SECS must be positive"
            ));
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, String> {
        [
            ("PORT", "8080"),
            ("PAYNOW_INTEGRATION_ID", "1201"),
            ("PAYNOW_INTEGRATION_KEY", "key-123"),
            ("PUBLIC_BASE_URL", "https://shop.example/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(&vars()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.paynow.initiate_url, DEFAULT_INITIATE_URL);
        assert_eq!(config.paynow.timeout_secs, 10);
        assert_eq!(config.merchant.return_url, "https://shop.example/payment/return");
        assert_eq!(config.merchant.result_url, "https://shop.example/api/pay/callback");
        assert_eq!(config.merchant.reference_prefix, "PAY");
        assert_eq!(config.merchant.default_method, PaymentMethod::Ecocash);
        assert_eq!(config.merchant.supported_methods.len(), 4);
        assert_eq!(config.store.capacity, 10_000);
        assert_eq!(config.store.pending_ttl, Duration::hours(24));
        assert_eq!(config.store.settled_ttl, Duration::hours(1));
    }

    #[test]
    fn test_missing_credentials() {
        let mut vars = vars();
        vars.remove("PAYNOW_INTEGRATION_KEY");
        assert!(Config::from_map(&vars).is_err());

        let mut vars = self::vars();
        vars.insert("PAYNOW_INTEGRATION_ID".to_string(), "  ".to_string());
        assert!(Config::from_map(&vars).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut vars = vars();
        vars.insert("PAYNOW_RESULT_URL".to_string(), "https://hooks.example/paynow".to_string());
        vars.insert("PAYNOW_SUPPORTED_METHODS".to_string(), "Visa, ecocash".to_string());
        vars.insert("PAYNOW_DEFAULT_METHOD".to_string(), "VISA".to_string());
        vars.insert("PAYNOW_INTEGRITY_SCHEME".to_string(), "hmac-sha512".to_string());
        vars.insert("TRANSACTION_STORE_CAPACITY".to_string(), "500".to_string());
        vars.insert("TRANSACTION_SETTLED_TTL_SECS".to_string(), "120".to_string());

        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.merchant.result_url, "https://hooks.example/paynow");
        assert_eq!(
            config.merchant.supported_methods,
            vec![PaymentMethod::Visa, PaymentMethod::Ecocash]
        );
        assert_eq!(config.merchant.default_method, PaymentMethod::Visa);
        assert_eq!(config.paynow.integrity_scheme, IntegrityScheme::HmacSha512);
        assert_eq!(config.store.capacity, 500);
        assert_eq!(config.store.settled_ttl, Duration::seconds(120));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("PORT", "80"),
            ("ENVIRONMENT", "qa"),
            ("PAYNOW_TIMEOUT_SECS", "0"),
            ("PAYNOW_SUPPORTED_METHODS", "ecocash,paypal"),
            ("PAYNOW_DEFAULT_METHOD", "innbucks"),
            ("PAYMENT_REFERENCE_PREFIX", "PAY_X"),
            ("PUBLIC_BASE_URL", "shop.example"),
            ("PAYNOW_INTEGRITY_SCHEME", "md5"),
            ("TRANSACTION_STORE_CAPACITY", "0"),
            ("TRANSACTION_PENDING_TTL_SECS", "-5"),
            ("TRANSACTION_SETTLED_TTL_SECS", "soon"),
        ];
        for (key, value) in cases {
            let mut vars = vars();
            vars.insert(key.to_string(), value.to_string());
            assert!(
                Config::from_map(&vars).is_err(),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_production_requires_https_result_url() {
        let mut vars = vars();
        vars.insert("ENVIRONMENT".to_string(), "production".to_string());
        vars.insert("PUBLIC_BASE_URL".to_string(), "http://shop.example".to_string());
        assert!(Config::from_map(&vars).is_err());
    }
}
