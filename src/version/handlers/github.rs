//! GitHub Releases API handler

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
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

/// Default base URL for GitHub API
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Largest page the releases API serves
const RELEASES_PER_PAGE: u32 = 100;

const DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "github",
    confidence: 100,
    priority: 90,
    capabilities: Capabilities {
        by_url: true,
        by_package: true,
    },
};

static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^mirror://github/([^/]+)/([^/]+)/",
        r"^https?://github\.com/([^/]+)/([^/]+)/(?:archive|releases/download)/",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid github url pattern"))
    .collect()
});

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    tarball_url: Option<String>,
    #[serde(default)]
    draft: bool,
}

/// Handler for projects publishing GitHub releases
pub struct GitHubHandler {
    fetcher: Arc<dyn Fetcher>,
    filter: Arc<VersionFilter>,
    base_url: String,
    timeout: Duration,
}

impl GitHubHandler {
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

    /// `owner/repo` from a source URL
    pub fn guess_repository(url: &str) -> Option<String> {
        URL_PATTERNS
            .iter()
            .find_map(|re| re.captures(url))
            .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
    }

    fn parse_repository(data: Option<&str>) -> Result<(&str, &str), HandlerError> {
        data.map(str::trim)
            .and_then(|d| d.split_once('/'))
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| {
                HandlerError::Configuration(format!(
                    "github needs 'owner/repo' as data, got {:?}",
                    data
                ))
            })
    }
}

#[async_trait]
impl Handler for GitHubHandler {
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
        let repository = Self::guess_repository(url).ok_or_else(|| {
            HandlerError::Extraction(format!("no repository in {}", url))
        })?;
        self.scan_pkg(package, &options.with_data(repository)).await
    }

    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        let (owner, repo) = Self::parse_repository(options.data())?;
        info!("Using GitHub API: {}/{}", owner, repo);

        let url = format!(
            "{}/repos/{}/{}/releases?per_page={}",
            self.base_url, owner, repo, RELEASES_PER_PAGE
        );
        let request = FetchRequest::new(url, self.timeout)
            .header("Accept", "application/vnd.github+json");
        let body = self.fetcher.fetch(&request).await?;

        let releases: Vec<Release> = serde_json::from_slice(&body).map_err(|e| {
            HandlerError::Extraction(format!("GitHub releases for {}/{}: {}", owner, repo, e))
        })?;

        let candidates: Vec<Candidate> = releases
            .iter()
            .filter(|r| !r.draft)
            .filter_map(|release| {
                let pv = accept_release(&self.filter, package, &release.tag_name, options)?;
                let tarball = release.tarball_url.clone().unwrap_or_else(|| {
                    format!(
                        "https://github.com/{}/{}/archive/{}.tar.gz",
                        owner, repo, release.tag_name
                    )
                });
                let urls = mangle_urls([tarball.as_str()], options);
                Some(Candidate::new(&urls, &pv, &DESCRIPTOR))
            })
            .collect();

        debug!(
            "Found {} candidates for {}/{} on GitHub",
            candidates.len(),
            owner,
            repo
        );

        Ok(candidates)
    }
}
