//! Enrichment pipeline: durable job ledger and task queue, chunked
//! self-rescheduling runner, per-family handlers, and the control surface.

pub mod events;
pub mod handlers;
pub mod manager;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod runner;

pub use events::JobEvent;
pub use handlers::{build_registry, classify_one};
pub use manager::{ControlError, JobManager, JobStatusReport};
pub use models::{EnrichmentJob, EnrichmentTask, JobKind, JobStatus, TaskStatus};
pub use registry::{EnrichmentHandler, HandlerRegistry, SharedHandlerRegistry, TaskOutcome};
pub use runner::JobRunner;
