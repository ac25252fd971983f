//! Payment gateway implementations
//!
//! Concrete implementations of the PaymentGateway trait.

pub mod paynow;

pub use paynow::{PaynowConfig, PaynowGateway};
