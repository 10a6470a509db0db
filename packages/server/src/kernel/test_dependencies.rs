// Test dependencies - mock implementations for testing
//
// Provides mock services that can be injected behind the Base* traits for
// unit tests: a scraper that serves canned pages, a classifier that replays
// scripted responses, and an in-memory image store.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    BaseClassifier, BaseImageStore, BaseWebScraper, ContentBlock, ScrapeError, ScrapeOptions,
    ScrapedPage,
};

// =============================================================================
// Mock Web Scraper
// =============================================================================

/// Scraper that serves canned pages by URL and records calls.
pub struct MockWebScraper {
    pages: Mutex<HashMap<String, ScrapedPage>>,
    failures: Mutex<HashMap<String, String>>,
    map_links: Mutex<Vec<String>>,
    bytes: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub scrape_calls: Arc<Mutex<Vec<String>>>,
}

impl MockWebScraper {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            map_links: Mutex::new(Vec::new()),
            bytes: Mutex::new(HashMap::new()),
            scrape_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(self, url: &str, markdown: &str) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            ScrapedPage {
                url: url.to_string(),
                markdown: markdown.to_string(),
                images: Vec::new(),
                links: Vec::new(),
                status_code: 200,
            },
        );
        self
    }

    pub fn with_images(self, url: &str, markdown: &str, images: Vec<&str>) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            ScrapedPage {
                url: url.to_string(),
                markdown: markdown.to_string(),
                images: images.into_iter().map(String::from).collect(),
                links: Vec::new(),
                status_code: 200,
            },
        );
        self
    }

    /// Make a URL fail with a named error kind: "timeout", "no_content",
    /// "redirect", or an HTTP status code.
    pub fn with_failure(self, url: &str, kind: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), kind.to_string());
        self
    }

    pub fn with_map_links(self, links: Vec<&str>) -> Self {
        *self.map_links.lock().unwrap() = links.into_iter().map(String::from).collect();
        self
    }

    pub fn with_bytes(self, url: &str, bytes: &[u8], content_type: &str) -> Self {
        self.bytes
            .lock()
            .unwrap()
            .insert(url.to_string(), (bytes.to_vec(), content_type.to_string()));
        self
    }
}

impl Default for MockWebScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseWebScraper for MockWebScraper {
    async fn scrape(
        &self,
        url: &str,
        _options: &ScrapeOptions,
    ) -> Result<ScrapedPage, ScrapeError> {
        self.scrape_calls.lock().unwrap().push(url.to_string());

        if let Some(kind) = self.failures.lock().unwrap().get(url) {
            return Err(match kind.as_str() {
                "timeout" => ScrapeError::Timeout,
                "no_content" => ScrapeError::NoContent,
                "redirect" => ScrapeError::Redirect {
                    location: "https://elsewhere.example".to_string(),
                },
                status => ScrapeError::Http {
                    status: status.parse().unwrap_or(500),
                },
            });
        }

        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(ScrapeError::Http { status: 404 })
    }

    async fn map_site(&self, _url: &str, limit: usize) -> Result<Vec<String>, ScrapeError> {
        let links = self.map_links.lock().unwrap();
        Ok(links.iter().take(limit).cloned().collect())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, String), ScrapeError> {
        self.bytes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(ScrapeError::Http { status: 404 })
    }
}

// =============================================================================
// Scripted Classifier
// =============================================================================

/// Classifier that replays scripted responses in order and records prompts.
pub struct ScriptedClassifier {
    responses: Mutex<Vec<String>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, response: &str) -> Self {
        self.responses.lock().unwrap().push(response.to_string());
        self
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseClassifier for ScriptedClassifier {
    async fn complete(&self, system: &str, blocks: Vec<ContentBlock>) -> Result<String> {
        let user_text = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                ContentBlock::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}\n---\n{}", system, user_text));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("ScriptedClassifier: no scripted response left");
        }
        Ok(responses.remove(0))
    }
}

// =============================================================================
// In-memory Image Store
// =============================================================================

/// Image store that keeps uploads in memory and returns fake public URLs.
pub struct MemoryImageStore {
    pub uploads: Arc<Mutex<Vec<(String, usize)>>>,
    fail: bool,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Make every upload fail (rehost fallback tests).
    pub fn failing() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Default for MemoryImageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseImageStore for MemoryImageStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("upload rejected");
        }
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), bytes.len()));
        Ok(format!("https://cdn.test/photos/{}", path))
    }
}
