//! Handler trait for discovering upstream releases of a package

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::package::Package;
use crate::version::error::HandlerError;
use crate::version::filter::VersionFilter;
use crate::version::mangling::{mangle_url, mangle_version};
use crate::version::options::ScanOptions;

/// Which scan entry points a handler implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub by_url: bool,
    pub by_package: bool,
}

/// Static identity of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDescriptor {
    /// Unique name, reported on every candidate
    pub name: &'static str,
    /// Trust level of the source, 0-100
    pub confidence: u8,
    /// Higher runs and ranks first
    pub priority: i32,
    pub capabilities: Capabilities,
}

/// One discovered upstream release
///
/// Serialized verbatim for the storage and presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Download URLs, space-joined when a release has several artifacts
    pub url: String,
    /// Canonical version
    pub version: String,
    pub handler: String,
    pub confidence: u8,
}

impl Candidate {
    pub fn new(urls: &[String], version: &str, descriptor: &HandlerDescriptor) -> Self {
        Self {
            url: urls.join(" "),
            version: version.to_string(),
            handler: descriptor.name.to_string(),
            confidence: descriptor.confidence,
        }
    }

    /// Individual download URLs
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.url.split_whitespace()
    }
}

/// Trait implemented once per upstream source type
#[async_trait]
pub trait Handler: Send + Sync {
    fn descriptor(&self) -> HandlerDescriptor;

    /// Whether this handler should scan the package, optionally for a given
    /// source URL. Must not perform I/O.
    fn can_handle(&self, package: &Package, url: Option<&str>) -> bool;

    /// Scan a package given a URL already known to belong to this source
    async fn scan_url(
        &self,
        _package: &Package,
        _url: &str,
        _options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        Err(HandlerError::Unsupported {
            handler: self.descriptor().name,
            entry_point: "scan by URL",
        })
    }

    /// Fetch the listing and return filtered candidates
    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError>;
}

/// Mangle an upstream token and run it through the filter
///
/// Returns the canonical version if the release should be reported.
pub fn accept_release(
    filter: &VersionFilter,
    package: &Package,
    up_pv: &str,
    options: &ScanOptions,
) -> Option<String> {
    let pv = mangle_version(up_pv, options);
    if filter.keep(&package.cp(), package.version(), pv.as_deref()) {
        pv
    } else {
        debug!("{}: filtered out upstream version '{}'", package.cp(), up_pv);
        None
    }
}

/// Apply the configured download URL rules to every URL of a release
pub fn mangle_urls<'a, I>(urls: I, options: &ScanOptions) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    urls.into_iter()
        .map(|url| mangle_url(url, options))
        .collect()
}
