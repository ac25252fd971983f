use crate::error::PaymentError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;

/// Body extractor accepting either a JSON document or a form-encoded body,
/// chosen by `Content-Type`. Rejections surface as `InvalidRequest`.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PaymentError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| PaymentError::invalid_request(rejection.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| PaymentError::invalid_request(rejection.body_text()))?;
            Ok(Self(value))
        }
    }
}
