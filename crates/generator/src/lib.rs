//! SBOMer generator framework.
//!
//! Turns a scheduled Generation into manifests, either in process
//! ([`CommandGenerator`]) or by dispatching an external job ([`JobGenerator`])
//! whose completion is later reported through the job watch channel.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`GeneratorError`)
//! - [`generator`]: `Generator` trait, selection rules, placeholder rendering
//! - [`registry`]: Generator table (`GeneratorRegistry`)
//! - [`job`]: External job generator and `JobRunner` abstraction
//! - [`process`]: Local child-process job runner (`ProcessJobRunner`)
//! - [`command`]: In-process command generator (`CommandGenerator`)
//! - [`service`]: Bus-driven orchestrator (`GenerationService`, `Pipeline` impl)

pub mod command;
pub mod error;
pub mod generator;
pub mod job;
pub mod process;
pub mod registry;
pub mod service;

// --- Public API Re-exports ---

pub use command::CommandGenerator;
pub use error::GeneratorError;
pub use generator::{DynGenerator, Generator, GeneratorOutcome, render_placeholders};
pub use job::{JobGenerator, JobRunner, JobSpec};
pub use process::ProcessJobRunner;
pub use registry::GeneratorRegistry;
pub use service::{GenerationOutcome, GenerationService, GenerationServiceBuilder};
