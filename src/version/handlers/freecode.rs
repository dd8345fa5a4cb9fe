//! Freecode handler scraping project release pages
//!
//! Never selected automatically: the project name has to be supplied as
//! the scan's `data` payload.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use tracing::{info, warn};

use crate::package::Package;
use crate::version::error::HandlerError;
use crate::version::fetcher::{FetchRequest, Fetcher};
use crate::version::filter::VersionFilter;
use crate::version::handler::{
    Candidate, Capabilities, Handler, HandlerDescriptor, accept_release, mangle_urls,
};
use crate::version::options::ScanOptions;

pub const DEFAULT_FREECODE_BASE_URL: &str = "http://freecode.com";

const DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "freecode",
    confidence: 100,
    priority: 90,
    capabilities: Capabilities {
        by_url: false,
        by_package: true,
    },
};

static DOWNLOAD_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s[^>]*?href="(/urls/[^"]+)""#).expect("valid download page regex")
});

static REDIRECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"In case it doesn't, click here:\s*<a\s[^>]*?href="([^"]+)""#)
        .expect("valid redirect regex")
});

/// Handler for projects listed on freecode.com
pub struct FreecodeHandler {
    fetcher: Arc<dyn Fetcher>,
    filter: Arc<VersionFilter>,
    base_url: String,
    timeout: Duration,
}

impl FreecodeHandler {
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

    async fn fetch_page(&self, path: &str) -> Result<String, HandlerError> {
        let request = FetchRequest::new(format!("{}{}", self.base_url, path), self.timeout);
        let body = self.fetcher.fetch(&request).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// `(release id, upstream version)` pairs from the listing page
    fn extract_releases(
        project: &str,
        content: &str,
    ) -> Result<Vec<(String, String)>, HandlerError> {
        let pattern = format!(
            r#"<a\s[^>]*?href="/projects/{}/releases/(\d+)"[^>]*>\s*([^<]+?)\s*</a>"#,
            regex::escape(project)
        );
        let re = Regex::new(&pattern)
            .map_err(|e| HandlerError::Extraction(format!("release pattern: {}", e)))?;

        Ok(re
            .captures_iter(content)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect())
    }

    /// Follow release page -> redirect page -> final download URL
    async fn resolve_download(
        &self,
        project: &str,
        release_id: &str,
    ) -> Result<String, HandlerError> {
        let release_page = self
            .fetch_page(&format!("/projects/{}/releases/{}", project, release_id))
            .await?;
        let download_page = DOWNLOAD_PAGE_RE
            .captures(&release_page)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| {
                HandlerError::Extraction(format!("no download link on release {}", release_id))
            })?;

        let redirect_page = self.fetch_page(&download_page).await?;
        REDIRECT_RE
            .captures(&redirect_page)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| {
                HandlerError::Extraction(format!("no redirect target on {}", download_page))
            })
    }
}

#[async_trait]
impl Handler for FreecodeHandler {
    fn descriptor(&self) -> HandlerDescriptor {
        DESCRIPTOR
    }

    fn can_handle(&self, _package: &Package, _url: Option<&str>) -> bool {
        false
    }

    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        let project = options
            .data()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                HandlerError::Configuration("freecode needs the project name as data".to_string())
            })?;

        info!("Using FreeCode handler: {}", project);

        let listing = self
            .fetch_page(&format!("/projects/{}/releases", project))
            .await?;

        let releases: Vec<(String, String)> = Self::extract_releases(project, &listing)?
            .into_iter()
            .filter_map(|(release_id, up_pv)| {
                accept_release(&self.filter, package, &up_pv, options).map(|pv| (release_id, pv))
            })
            .collect();

        let resolved = join_all(
            releases
                .iter()
                .map(|(release_id, _)| self.resolve_download(project, release_id)),
        )
        .await;

        let candidates = releases
            .iter()
            .zip(resolved)
            .filter_map(|((release_id, pv), result)| match result {
                Ok(url) => {
                    let urls = mangle_urls([url.as_str()], options);
                    Some(Candidate::new(&urls, pv, &DESCRIPTOR))
                }
                Err(e) => {
                    warn!(
                        "Skipping {} release {} ({}): {}",
                        project, release_id, pv, e
                    );
                    None
                }
            })
            .collect();

        Ok(candidates)
    }
}
