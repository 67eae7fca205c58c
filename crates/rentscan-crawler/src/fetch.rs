use std::io::prelude::*;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, PRAGMA,
    USER_AGENT,
};

use crate::config::CrawlerConfig;
use crate::error::FetchError;

lazy_static! {
    static ref HTTP_CLI: reqwest::Client = reqwest::ClientBuilder::new()
        .gzip(true)
        .deflate(true)
        .build()
        .unwrap_or_default();
}

/// Downloads the page behind an URL.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));

        Ok(Self {
            headers,
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = HTTP_CLI
            .get(url)
            .headers(self.headers.clone())
            .query(&[("noimg", "1")])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let page = match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut page = String::new();
                gz.read_to_string(&mut page)?;
                page
            }
            _ => resp.text().await?,
        };

        Ok(page)
    }
}
