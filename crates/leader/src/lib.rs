//! SBOMer lease-based leader election.
//!
//! Exactly one replica at a time performs scheduling side effects. Every
//! replica runs a [`LeaderElector`] against a shared [`LeaseStore`]; the
//! current role is published through a [`LeaderHandle`].
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`LeaderError`)
//! - [`lease`]: Lease record (`Lease`)
//! - [`store`]: Lease stores (`InMemoryLeaseStore`, `FileLeaseStore`, `LeaseBackend`)
//! - [`elector`]: Election loop (`LeaderElector`, `LeaderHandle`, `Pipeline` impl)

pub mod elector;
pub mod error;
pub mod lease;
pub mod store;

// --- Public API Re-exports ---

pub use elector::{ElectionSettings, LeaderElector, LeaderHandle};
pub use error::LeaderError;
pub use lease::Lease;
pub use store::{FileLeaseStore, InMemoryLeaseStore, LeaseBackend, LeaseStore};
