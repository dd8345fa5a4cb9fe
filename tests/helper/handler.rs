//! Handler test utilities

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use upstream_scan::package::Package;
use upstream_scan::scan::{Dispatcher, HandlerRegistry};
use upstream_scan::version::error::{FetchError, HandlerError};
use upstream_scan::version::filter::VersionFilter;
use upstream_scan::version::handler::{
    Candidate, Capabilities, Handler, HandlerDescriptor, accept_release, mangle_urls,
};
use upstream_scan::version::options::ScanOptions;

/// Stub handler answering with canned upstream releases
pub struct StubHandler {
    descriptor: HandlerDescriptor,
    url_prefix: Option<&'static str>,
    auto: bool,
    releases: Vec<(String, String)>,
    failure: Option<FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubHandler {
    pub fn new(name: &'static str, confidence: u8, priority: i32) -> Self {
        Self {
            descriptor: HandlerDescriptor {
                name,
                confidence,
                priority,
                capabilities: Capabilities {
                    by_url: false,
                    by_package: true,
                },
            },
            url_prefix: None,
            auto: false,
            releases: Vec::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Claim source URLs starting with `prefix`
    pub fn claims(mut self, prefix: &'static str) -> Self {
        self.url_prefix = Some(prefix);
        self.descriptor.capabilities.by_url = true;
        self
    }

    /// Accept packages without a URL
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Raw upstream version and download URL
    pub fn with_release(mut self, up_pv: &str, url: &str) -> Self {
        self.releases.push((up_pv.to_string(), url.to_string()));
        self
    }

    pub fn failing(mut self, error: FetchError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone().into());
        }

        let filter = VersionFilter::default();
        Ok(self
            .releases
            .iter()
            .filter_map(|(up_pv, url)| {
                let pv = accept_release(&filter, package, up_pv, options)?;
                let urls = mangle_urls([url.as_str()], options);
                Some(Candidate::new(&urls, &pv, &self.descriptor))
            })
            .collect())
    }
}

#[async_trait]
impl Handler for StubHandler {
    fn descriptor(&self) -> HandlerDescriptor {
        self.descriptor
    }

    fn can_handle(&self, _package: &Package, url: Option<&str>) -> bool {
        match url {
            Some(url) => self.url_prefix.is_some_and(|prefix| url.starts_with(prefix)),
            None => self.auto,
        }
    }

    async fn scan_url(
        &self,
        package: &Package,
        _url: &str,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        self.answer(package, options).await
    }

    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        self.answer(package, options).await
    }
}

/// Wraps a real handler so automatic selection always picks it
pub struct AutoSelected<H>(pub H);

#[async_trait]
impl<H: Handler> Handler for AutoSelected<H> {
    fn descriptor(&self) -> HandlerDescriptor {
        self.0.descriptor()
    }

    fn can_handle(&self, _package: &Package, _url: Option<&str>) -> bool {
        true
    }

    async fn scan_url(
        &self,
        package: &Package,
        url: &str,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        self.0.scan_url(package, url, options).await
    }

    async fn scan_pkg(
        &self,
        package: &Package,
        options: &ScanOptions,
    ) -> Result<Vec<Candidate>, HandlerError> {
        self.0.scan_pkg(package, options).await
    }
}

/// Create a dispatcher over the given handlers
pub fn create_test_dispatcher(
    handlers: Vec<Arc<dyn Handler>>,
    handler_timeout: Duration,
    scan_timeout: Duration,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(HandlerRegistry::new(handlers)),
        handler_timeout,
        scan_timeout,
    )
}

pub fn network_error(url: &str) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}
