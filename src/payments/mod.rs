//! Payment relay module
//!
//! Forwards payment initiations to the gateway and verifies the gateway's
//! asynchronous result notifications before reporting an outcome.

pub mod callback;
pub mod events;
pub mod initiator;
pub mod integrity;
pub mod providers;
pub mod reference;
pub mod store;
pub mod traits;
pub mod types;

pub use callback::{CallbackOutcome, CallbackReceiver};
pub use events::BroadcastEventSink;
pub use initiator::{MerchantSettings, PaymentInitiator};
pub use store::{InMemoryTransactionStore, StoreConfig};
