//! HTTP surface: payment initiation, gateway callback and health.

pub mod extract;
pub mod health;
pub mod payments;

use crate::config::Config;
use crate::error::AppResult;
use crate::payments::initiator::IntegrationCredentials;
use crate::payments::providers::PaynowGateway;
use crate::payments::traits::{PaymentEventSink, PaymentGateway, TransactionStore};
use crate::payments::{
    BroadcastEventSink, CallbackReceiver, InMemoryTransactionStore, MerchantSettings,
    PaymentInitiator,
};
use axum::{
    http::{HeaderName, Request},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub initiator: Arc<PaymentInitiator>,
    pub receiver: Arc<CallbackReceiver>,
}

impl AppState {
    /// Wire the relay around the given collaborators
    pub fn new(
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn TransactionStore>,
        events: Arc<dyn PaymentEventSink>,
    ) -> Self {
        let merchant = MerchantSettings {
            description: config.merchant.description.clone(),
            return_url: config.merchant.return_url.clone(),
            result_url: config.merchant.result_url.clone(),
            reference_prefix: config.merchant.reference_prefix.clone(),
            supported_methods: config.merchant.supported_methods.clone(),
            default_method: config.merchant.default_method,
        };
        let credentials = IntegrationCredentials {
            integration_id: config.paynow.integration_id.clone(),
            integration_key: config.paynow.integration_key.clone(),
        };

        let initiator = PaymentInitiator::new(
            gateway,
            store.clone(),
            events.clone(),
            credentials,
            merchant,
        );
        let receiver = CallbackReceiver::new(
            config.paynow.signer(),
            store,
            events,
            config.merchant.reference_prefix.clone(),
        );

        Self {
            config,
            initiator: Arc::new(initiator),
            receiver: Arc::new(receiver),
        }
    }

    /// Paynow gateway with in-process transaction state and events
    pub fn from_config(
        config: Config,
        store: Arc<InMemoryTransactionStore>,
        events: BroadcastEventSink,
    ) -> AppResult<Self> {
        let gateway = PaynowGateway::new(config.paynow.clone())?;
        Ok(Self::new(config, Arc::new(gateway), store, Arc::new(events)))
    }
}

/// Creates the API router
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let pay_routes = Router::new()
        .route("/initiate", post(payments::initiate_payment))
        .route("/callback", post(payments::payment_callback))
        .route("/:method", post(payments::initiate_method_payment));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/pay", pay_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}
