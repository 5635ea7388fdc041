//! Ghostwire - Virtual User Provisioning for Protocol Bridges
//!
//! Lets a bridge act as many homeserver users without provisioning them by hand.
//!
//! Key principles:
//! - Register and join lazily, right before the first action that needs it
//! - Recover from registration races and forbidden joins internally
//! - Cache registration and membership facts to skip redundant calls
//! - Every other failure reaches the caller unmodified

pub mod intent;
pub mod protocol;
