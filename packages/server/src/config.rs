use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub firecrawl_api_key: String,
    pub anthropic_api_key: String,
    pub storage_url: Option<String>,
    pub storage_api_key: Option<String>,
    pub storage_bucket: String,
    pub admin_api_token: String,
    pub enrichment: EnrichmentConfig,
}

/// Tuning knobs for the enrichment pipeline.
///
/// Passed into the runner at construction — handlers never read the
/// environment at call sites.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Tasks processed per runner invocation before it reschedules itself
    pub chunk_size: i64,
    /// Parallel scrape/classify calls within one chunk
    pub concurrency: usize,
    /// Upper bound on any single scrape call
    pub scrape_timeout: Duration,
    /// Classifier model id
    pub model: String,
    /// Candidate images considered per listing for hero selection
    pub max_candidate_images: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            chunk_size: 25,
            concurrency: 5,
            scrape_timeout: Duration::from_secs(30),
            model: "claude-sonnet-4-20250514".to_string(),
            max_candidate_images: 12,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let enrichment = EnrichmentConfig {
            chunk_size: env_parse("ENRICHMENT_CHUNK_SIZE", 25)?,
            concurrency: env_parse("ENRICHMENT_CONCURRENCY", 5)?,
            scrape_timeout: Duration::from_secs(env_parse("SCRAPE_TIMEOUT_SECS", 30)?),
            model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            max_candidate_images: env_parse("MAX_CANDIDATE_IMAGES", 12)?,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            firecrawl_api_key: env::var("FIRECRAWL_API_KEY")
                .context("FIRECRAWL_API_KEY must be set")?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY must be set")?,
            storage_url: env::var("STORAGE_URL").ok(),
            storage_api_key: env::var("STORAGE_API_KEY").ok(),
            storage_bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "photos".to_string()),
            admin_api_token: env::var("ADMIN_API_TOKEN").context("ADMIN_API_TOKEN must be set")?,
            enrichment,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrichment_defaults_are_bounded() {
        let config = EnrichmentConfig::default();
        assert!(config.chunk_size > 0);
        assert!((3..=20).contains(&config.concurrency));
        assert!(config.scrape_timeout >= Duration::from_secs(15));
    }
}
