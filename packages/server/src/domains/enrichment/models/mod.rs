pub mod job;
pub mod task;

pub use job::{EnrichmentJob, JobKind, JobStatus};
pub use task::{EnrichmentTask, TaskStatus};
