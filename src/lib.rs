//! Paynow payment relay
//!
//! Forwards payment initiations to the Paynow gateway and verifies the
//! gateway's result notifications before reporting them downstream.
//!
//! - **payments**: initiator, callback receiver, gateway provider, integrity hashing
//! - **api**: axum routes and handlers
//! - **config**: environment-driven configuration

pub mod api;
pub mod config;
pub mod error;
pub mod payments;

pub use api::{create_router, AppState};
pub use error::{AppResult, PaymentError};
