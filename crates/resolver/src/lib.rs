//! SBOMer resolver framework.
//!
//! Turns a persisted NEW Event into zero or more Generations by routing it to
//! the resolver registered for its routing key.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ResolverError`)
//! - [`resolver`]: `Resolver` trait and its dyn-compatible form
//! - [`registry`]: Routing key to resolver table (`ResolverRegistry`)
//! - [`route`]: Config-driven resolver (`RouteResolver`)
//! - [`service`]: Bus-driven orchestrator (`ResolutionService`, `Pipeline` impl)

pub mod error;
pub mod registry;
pub mod resolver;
pub mod route;
pub mod service;

// --- Public API Re-exports ---

pub use error::ResolverError;
pub use registry::ResolverRegistry;
pub use resolver::{DynResolver, Resolver};
pub use route::RouteResolver;
pub use service::{ResolutionOutcome, ResolutionService, ResolutionServiceBuilder};
