//! Infrastructure layer: external clients, DI traits, streaming hub.

pub mod anthropic_client;
pub mod firecrawl_client;
pub mod server_kernel;
pub mod storage_client;
pub mod stream_hub;
pub mod traits;

pub mod test_dependencies;

pub use anthropic_client::AnthropicClient;
pub use firecrawl_client::FirecrawlClient;
pub use server_kernel::ServerKernel;
pub use storage_client::{content_path, NoopImageStore, StorageClient};
pub use stream_hub::StreamHub;
pub use traits::{
    BaseClassifier, BaseImageStore, BaseWebScraper, ContentBlock, ScrapeError, ScrapeOptions,
    ScrapedPage,
};
