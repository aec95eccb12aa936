mod builder;

use crate::error::{ClientError, Result};
pub use crate::log_debug;
pub use builder::ClientBuilder;
use rquest::Client as RquestClient;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// Fetches the HTML of a chapter page.
///
/// The walker only depends on this capability, so pages can come from HTTP, disk or tests.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug)]
pub struct ClientResponse {
    pub status: u16,
    pub content: String,
}

pub struct Client {
    inner: RquestClient,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn get(&self, url: &str) -> Result<ClientResponse> {
        let url = Url::parse(url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.request(url.as_str()).await
    }

    async fn request(&self, url: &str) -> Result<ClientResponse> {
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let is_success = response.status().is_success();
        let content = response.text().await.map_err(|e| {
            ClientError::RequestFailed(format!("Failed to get response text: {}", e))
        })?;

        if !is_success {
            return Err(ClientError::ResponseError {
                status_code: status,
                url: url.to_string(),
            }
            .into());
        }

        Ok(ClientResponse { status, content })
    }
}

impl PageSource for Client {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        log_debug!(
            "[client] {} -> {} ({} bytes)",
            url,
            response.status,
            response.content.len()
        );
        Ok(response.content)
    }
}

/// Serves a page saved to disk, for extracting from a browser "Save page as".
#[derive(Default)]
pub struct FileSource {
    pages: HashMap<String, PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.pages.insert(url.into(), path.into());
        self
    }
}

impl PageSource for FileSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let path = self
            .pages
            .get(url)
            .ok_or_else(|| ClientError::InvalidUrl(format!("no saved page for {}", url)))?;
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_source_serves_registered_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<p>saved</p>").unwrap();

        let source = FileSource::new().with_page("file:page", &path);
        assert_eq!(source.fetch("file:page").await.unwrap(), "<p>saved</p>");
        assert!(source.fetch("file:other").await.is_err());
    }

    #[tokio::test]
    async fn rejects_invalid_urls_before_sending() {
        let client = Client::builder().build().unwrap();
        let err = client.get("not a url").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Client(ClientError::InvalidUrl(_))
        ));
    }
}
