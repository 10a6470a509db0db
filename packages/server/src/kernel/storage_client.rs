//! Object storage client implementation of BaseImageStore.
//!
//! Supabase-style storage API: `POST {url}/object/{bucket}/{path}` with the
//! raw bytes, public URL at `{url}/object/public/{bucket}/{path}`. Used by
//! photo rehosting; callers fall back to the source URL when upload fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::BaseImageStore;

/// HTTP object storage client.
pub struct StorageClient {
    base_url: String,
    api_key: String,
    bucket: String,
    client: reqwest::Client,
}

impl StorageClient {
    pub fn new(base_url: String, api_key: String, bucket: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
            client,
        })
    }
}

/// Content-addressed storage path for an image: `{sha256[..16]}.{ext}`.
///
/// Re-uploading the same bytes lands on the same path, which makes photo
/// rehosting idempotent across job reruns.
pub fn content_path(bytes: &[u8], content_type: &str) -> String {
    let digest = Sha256::digest(bytes);
    let ext = match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    };
    format!("{}.{}", &hex::encode(digest)[..16], ext)
}

#[async_trait]
impl BaseImageStore for StorageClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/object/{}/{}",
                self.base_url, self.bucket, path
            ))
            .bearer_auth(&self.api_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .context("Failed to send storage upload")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Storage upload error {}: {}", status, body);
        }

        Ok(format!(
            "{}/object/public/{}/{}",
            self.base_url, self.bucket, path
        ))
    }
}

/// No-op store for deployments without storage configured.
///
/// Upload "fails" cleanly so rehosting falls back to the source URL.
pub struct NoopImageStore;

#[async_trait]
impl BaseImageStore for NoopImageStore {
    async fn upload(&self, _path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        tracing::warn!("NoopImageStore: upload called but no storage configured");
        anyhow::bail!("no object storage configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_path_is_stable() {
        let a = content_path(b"same bytes", "image/jpeg");
        let b = content_path(b"same bytes", "image/jpeg");
        assert_eq!(a, b);
        assert!(a.ends_with(".jpg"));
    }

    #[test]
    fn content_path_varies_by_bytes() {
        assert_ne!(
            content_path(b"one", "image/png"),
            content_path(b"two", "image/png")
        );
    }
}
