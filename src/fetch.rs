//! Transports that turn a locator into raw CSV text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, trace};

use crate::domain::SVError;

const USER_AGENT: &str = concat!("sheetview/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Returns the body behind `locator` or fails; never retries.
    async fn fetch(&self, locator: &str) -> Result<String, SVError>;
}

/// Read-only HTTP(S) transport.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SVError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<String, SVError> {
        let response = self.client.get(locator).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SVError::Transport {
                locator: locator.to_string(),
                reason: format!("HTTP status {status}"),
            });
        }
        let body = response.text().await?;
        debug!("Received {} bytes", body.len());
        Ok(body)
    }
}

/// Reads sheets from the local file system (`file://` prefix optional).
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetch for FileFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<String, SVError> {
        let raw = locator.strip_prefix("file://").unwrap_or(locator);
        let path = shellexpand::full(raw).map_err(|e| SVError::Transport {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        trace!("Reading {path}");
        let body = tokio::fs::read_to_string(&*path).await?;
        Ok(body)
    }
}

/// Picks the transport by the locator scheme.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SVError> {
        Ok(Self {
            http: HttpFetcher::new(timeout)?,
            file: FileFetcher,
        })
    }
}

pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

#[async_trait]
impl Fetch for SourceFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, SVError> {
        if is_remote(locator) {
            self.http.fetch(locator).await
        } else {
            self.file.fetch(locator).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_remote_locators() {
        assert!(is_remote("https://host/x"));
        assert!(is_remote("http://host/x"));
        assert!(!is_remote("file:///tmp/x.csv"));
        assert!(!is_remote("data/x.csv"));
    }

    #[tokio::test]
    async fn reads_local_files() {
        let path = std::env::temp_dir().join(format!("sheetview-fetch-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "#,A\n1,x\n").unwrap();

        let fetcher = SourceFetcher::new(Duration::from_secs(1)).unwrap();
        let locator = format!("file://{}", path.display());
        let body = fetcher.fetch(&locator).await.unwrap();
        assert_eq!(body, "#,A\n1,x\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let fetcher = FileFetcher;
        let result = fetcher.fetch("/definitely/not/here.csv").await;
        assert!(matches!(result, Err(SVError::IoError(_))));
    }
}
