// HTTP routes
pub mod health;
pub mod jobs;
pub mod listings;
pub mod stream;

pub use health::health_handler;
pub use jobs::{job_control_handler, job_status_handler};
pub use listings::classify_listing_handler;
pub use stream::job_stream_handler;
