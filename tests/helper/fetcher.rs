//! Fetcher test utilities

use std::collections::HashMap;

use async_trait::async_trait;

use upstream_scan::version::error::FetchError;
use upstream_scan::version::fetcher::{FetchRequest, Fetcher};

/// Fetcher serving canned responses by exact URL; anything else is a 404
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), Ok(body.as_bytes().to_vec()));
        self
    }

    pub fn time_out(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: std::time::Duration::from_secs(30),
            }),
        );
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        self.responses
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::HttpStatus {
                    url: request.url.clone(),
                    status: 404,
                })
            })
    }
}
