// Touchless Car Wash Directory - API Core
//
// Backend for the directory's enrichment pipeline: durable job/task ledger,
// chunked self-rescheduling runner, scrape/classify/storage clients, and the
// admin control surface with SSE progress streaming.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
