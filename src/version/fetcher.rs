//! Raw content retrieval for handler listing and detail pages

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use tracing::debug;

use crate::version::error::FetchError;

/// A single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Trait for fetching raw bytes from a URL
///
/// Implementations must bound every request by `request.timeout` and must not
/// retry on their own.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().user_agent(user_agent).build()?,
        })
    }

    fn map_error(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching {}", request.url);

        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request.url, request.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&request.url, request.timeout, e))?;

        Ok(body.to_vec())
    }
}
