//! Virtual User Intents
//!
//! Lets the bridge act as many homeserver users ("ghosts") without call sites
//! provisioning them by hand:
//! - Accounts are registered on first use
//! - Rooms are joined on first use, with a bot invite when joining is forbidden
//! - Registration and membership facts are cached in a shared state store

pub mod api;
pub mod appservice;
pub mod locks;
pub mod mock;
pub mod state_store;
pub mod traits;

#[cfg(test)]
mod proptests;

pub use api::{BotIdentity, IntentApi, IntentError, IntentResult};
pub use appservice::AppService;
pub use locks::ProvisioningLocks;
pub use mock::MockTransportClient;
pub use state_store::{
    JsonFileStateStore, Membership, MemoryStateStore, StateStore, StoreError, StoreSnapshot,
};
pub use traits::{ErrorCode, RoomId, TransportClient, TransportError, TransportResult, UserId};
