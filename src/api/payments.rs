use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::extract::JsonOrForm;
use crate::api::AppState;
use crate::error::{AppResult, PaymentError};
use crate::payments::types::{CallbackNotification, InitiatedPayment, PaymentMethod, PaymentRequest};
use crate::payments::CallbackOutcome;

/// Client payment request body
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentBody {
    pub email: String,
    pub phone: String,
    pub amount: Decimal,
    #[serde(default)]
    pub method: Option<String>,
}

impl InitiatePaymentBody {
    /// Resolve the method from the path, then the body, then the default.
    fn into_request(
        self,
        path_method: Option<&str>,
        default_method: PaymentMethod,
    ) -> AppResult<PaymentRequest> {
        let method = match path_method.or(self.method.as_deref()) {
            Some(name) if !name.trim().is_empty() => name.parse::<PaymentMethod>()?,
            _ => default_method,
        };

        Ok(PaymentRequest {
            email: self.email,
            phone: self.phone,
            amount: self.amount,
            method,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackAck {
    pub acknowledged: bool,
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    JsonOrForm(body): JsonOrForm<InitiatePaymentBody>,
) -> AppResult<Json<InitiatedPayment>> {
    let request = body.into_request(None, state.initiator.default_method())?;
    let initiated = state.initiator.initiate(request).await?;
    Ok(Json(initiated))
}

pub async fn initiate_method_payment(
    State(state): State<AppState>,
    Path(method): Path<String>,
    JsonOrForm(body): JsonOrForm<InitiatePaymentBody>,
) -> AppResult<Json<InitiatedPayment>> {
    let request = body.into_request(Some(&method), state.initiator.default_method())?;
    let initiated = state.initiator.initiate(request).await?;
    Ok(Json(initiated))
}

/// Gateway result notification, form-encoded or JSON. Always answers 200;
/// verification failures only show up in the logs.
pub async fn payment_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<CallbackAck> {
    let parsed = if body.is_empty() {
        CallbackNotification::parse(query.as_deref().map(str::as_bytes).unwrap_or_default())
    } else if is_json(&headers) {
        CallbackNotification::parse_json(&body)
    } else {
        CallbackNotification::parse(&body)
    };

    let result = match parsed {
        Ok(notification) => state.receiver.handle_callback(&notification).await,
        Err(e) => Err(e),
    };

    let acknowledged = match result {
        Ok(CallbackOutcome::Settled(record)) => {
            info!(
                "Callback accepted: reference={}, status={:?}",
                record.reference, record.status
            );
            true
        }
        Ok(CallbackOutcome::Pending { reference, status }) => {
            info!(
                "Callback acknowledged without settlement: reference={}, status={}",
                reference, status
            );
            true
        }
        Ok(CallbackOutcome::Unrecognised { reference, status }) => {
            warn!(
                "Callback acknowledged with unrecognised status: reference={}, status={}",
                reference, status
            );
            true
        }
        Err(e @ PaymentError::MalformedCallback { .. }) => {
            warn!("Rejected callback: {}", e);
            false
        }
        Err(e @ PaymentError::AlreadySettled { .. }) => {
            info!("Ignoring redelivered callback: {}", e);
            true
        }
        Err(e) if e.is_callback_rejection() => {
            warn!("Rejected callback: {}", e);
            true
        }
        Err(e) => {
            error!("Callback processing failed: {}", e);
            true
        }
    };

    Json(CallbackAck { acknowledged })
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn body(method: Option<&str>) -> InitiatePaymentBody {
        InitiatePaymentBody {
            email: "a@b.com".to_string(),
            phone: "0771234567".to_string(),
            amount: dec!(25.00),
            method: method.map(str::to_string),
        }
    }

    #[test]
    fn test_method_resolution() {
        let request = body(None).into_request(None, PaymentMethod::Ecocash).unwrap();
        assert_eq!(request.method, PaymentMethod::Ecocash);

        let request = body(Some("VISA")).into_request(None, PaymentMethod::Ecocash).unwrap();
        assert_eq!(request.method, PaymentMethod::Visa);

        let request = body(Some("visa"))
            .into_request(Some("mastercard"), PaymentMethod::Ecocash)
            .unwrap();
        assert_eq!(request.method, PaymentMethod::Mastercard);

        let request = body(Some("")).into_request(None, PaymentMethod::Onemoney).unwrap();
        assert_eq!(request.method, PaymentMethod::Onemoney);
    }

    #[test]
    fn test_json_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, "application/x-www-form-urlencoded".parse().unwrap());
        assert!(!is_json(&headers));
    }

    #[test]
    fn test_unknown_method_is_invalid_request() {
        let err = body(Some("paypal"))
            .into_request(None, PaymentMethod::Ecocash)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest { .. }));
    }
}
