//! Firecrawl client implementation of BaseWebScraper.
//!
//! Thin typed wrapper over the hosted scraping API's `/v1/scrape` and
//! `/v1/map` endpoints. All remote failure modes are converted into
//! `ScrapeError` variants so batch callers can map them onto a listing's
//! `crawl_status` instead of aborting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BaseWebScraper, ScrapeError, ScrapeOptions, ScrapedPage};

const DEFAULT_API_URL: &str = "https://api.firecrawl.dev";

/// Firecrawl API client.
pub struct FirecrawlClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [String],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
    #[serde(rename = "waitFor", skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    metadata: ScrapeMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeMetadata {
    #[serde(rename = "statusCode", default)]
    status_code: Option<u16>,
    #[serde(rename = "url", default)]
    final_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct MapRequest<'a> {
    url: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    #[serde(default)]
    links: Vec<String>,
}

impl FirecrawlClient {
    /// Create a new Firecrawl client against the hosted API.
    pub fn new(api_key: String) -> Result<Self, ScrapeError> {
        Self::with_api_url(DEFAULT_API_URL.to_string(), api_key)
    }

    /// Create a client against a custom endpoint (self-hosted / tests).
    pub fn with_api_url(api_url: String, api_key: String) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ScrapeError::Transport(e.to_string()))?;

        Ok(Self {
            api_url,
            api_key,
            client,
        })
    }

    fn classify_transport(e: reqwest::Error) -> ScrapeError {
        if e.is_timeout() {
            ScrapeError::Timeout
        } else {
            ScrapeError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl BaseWebScraper for FirecrawlClient {
    async fn scrape(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<ScrapedPage, ScrapeError> {
        let request = ScrapeRequest {
            url,
            formats: &options.formats,
            only_main_content: options.only_main_content,
            wait_for: options.wait_for_ms,
            timeout: options.timeout_ms,
        };

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The service reports unsupported sites as a 4xx with a message
            if status.as_u16() == 403 || body.contains("no longer supported") {
                return Err(ScrapeError::Unsupported(body));
            }
            return Err(ScrapeError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Transport(e.to_string()))?;

        if !parsed.success {
            return Err(ScrapeError::Unsupported(
                parsed.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        let data = parsed.data.ok_or(ScrapeError::NoContent)?;
        let page_status = data.metadata.status_code.unwrap_or(200);

        if (300..400).contains(&page_status) {
            return Err(ScrapeError::Redirect {
                location: data.metadata.final_url.unwrap_or_default(),
            });
        }
        if page_status >= 400 {
            return Err(ScrapeError::Http {
                status: page_status,
            });
        }

        let markdown = data.markdown.unwrap_or_default();
        if markdown.trim().is_empty() && data.images.is_empty() {
            return Err(ScrapeError::NoContent);
        }

        Ok(ScrapedPage {
            url: data.metadata.final_url.unwrap_or_else(|| url.to_string()),
            markdown,
            images: data.images,
            links: data.links,
            status_code: page_status,
        })
    }

    async fn map_site(&self, url: &str, limit: usize) -> Result<Vec<String>, ScrapeError> {
        let request = MapRequest { url, limit };

        let response = self
            .client
            .post(format!("{}/v1/map", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            return Err(ScrapeError::Http {
                status: response.status().as_u16(),
            });
        }

        let parsed: MapResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Transport(e.to_string()))?;

        Ok(parsed.links)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, String), ScrapeError> {
        // Plain GET, not proxied through the scraping API
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            return Err(ScrapeError::Http {
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(Self::classify_transport)?;

        Ok((bytes.to_vec(), content_type))
    }
}
