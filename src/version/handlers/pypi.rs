//! PyPI handler using the JSON API

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::package::Package;
use crate::version::error::HandlerError;
use crate::version::fetcher::{FetchRequest, Fetcher};
use crate::version::filter::VersionFilter;
use crate::version::handler::{
    Candidate, Capabilities, Handler, HandlerDescriptor, accept_release, mangle_urls,
};
use crate::version::options::ScanOptions;

pub const DEFAULT_PYPI_BASE_URL: &str = "https://pypi.org";

const DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "pypi",
    confidence: 100,
    priority: 90,
    capabilities: Capabilities {
        by_url: true,
        by_package: true,
    },
};

/// Source URL patterns; the first capture group is the distribution name
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^mirror://pypi/\w+/([^/]+)/[^/]*$",
        r"^https?://files\.pythonhosted\.org/packages/source/\w+/([^/]+)/[^/]*$",
        r"^https?://pypi\.(?:io|org|python\.org)/packages/source/\w+/([^/]+)/[^/]*$",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid pypi url pattern"))
    .collect()
});

/// PyPI JSON API response structure
#[derive(Debug, Deserialize)]
struct PypiResponse {
    releases: Option<IndexMap<String, Vec<PypiFile>>>,
}

/// One uploaded artifact of a release
#[derive(Debug, Deserialize)]
struct PypiFile {
    url: String,
}

/// Handler for packages distributed on PyPI
pub struct PypiHandler {
    fetcher: Arc<dyn Fetcher>,
    filter: Arc<VersionFilter>,
    base_url: String,
    timeout: Duration,
}

impl PypiHandler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        filter: Arc<VersionFilter>,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            filter,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Distribution name from a source URL, falling back to the package name
    pub fn guess_package(package: &Package, url: &str) -> String {
        URL_PATTERNS
            .iter()
            .find_map(|re| re.captures(url))
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| package.name().to_string())
    }
}

#[async_trait]
impl Handler for PypiHandler {
    fn descriptor(&self) -> HandlerDescriptor {
        DESCRIPTOR
    }

    fn can_handle(&self, _package: &Package, url: Option<&str>) -> bool {
        url.is_some_and(|url| URL_PATTERNS.iter().any(|re| re.is_match(url)))
    }

    async fn scan_url(
        &self,
        package: &Package,
        url: &str,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        let name = Self::guess_package(package, url);
        self.scan_pkg(package, &options.with_data(name)).await
    }

    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        let name = options.data().unwrap_or(package.name()).trim();
        info!("Using PyPI API: {}", name);

        let url = format!("{}/pypi/{}/json", self.base_url, name);
        let request = FetchRequest::new(url, self.timeout).header("Accept", "application/json");
        let body = self.fetcher.fetch(&request).await?;

        let response: PypiResponse = serde_json::from_slice(&body)
            .map_err(|e| HandlerError::Extraction(format!("PyPI response for {}: {}", name, e)))?;

        let Some(releases) = response.releases else {
            debug!("PyPI response for {} has no releases", name);
            return Ok(Vec::new());
        };

        let candidates: Vec<Candidate> = releases
            .iter()
            .filter_map(|(up_pv, files)| {
                let pv = accept_release(&self.filter, package, up_pv, options)?;
                if files.is_empty() {
                    debug!("{} {} has no uploaded files, skipping", name, up_pv);
                    return None;
                }
                let urls = mangle_urls(files.iter().map(|f| f.url.as_str()), options);
                Some(Candidate::new(&urls, &pv, &DESCRIPTOR))
            })
            .collect();

        debug!("Found {} candidates for {} on PyPI", candidates.len(), name);

        Ok(candidates)
    }
}
