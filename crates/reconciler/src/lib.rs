//! SBOMer external job reconciliation bridge.
//!
//! Generators that delegate work to an external job leave the Generation in
//! GENERATING. The job runner reports job observations (ordered conditions
//! plus a correlation label naming the Generation); the [`JobReconciler`]
//! turns each observation into a guarded Generation transition.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ReconcilerError`)
//! - [`outcome`]: Three-state job verdict (`JobOutcome`)
//! - [`reconciler`]: Observation consumer (`JobReconciler`, `Pipeline` impl)

pub mod error;
pub mod outcome;
pub mod reconciler;

// --- Public API Re-exports ---

pub use error::ReconcilerError;
pub use outcome::JobOutcome;
pub use reconciler::{JobReconciler, JobReconcilerBuilder, ReconcileOutcome};
