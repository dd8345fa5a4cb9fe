//! Scan several packages in one pass

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::error;

use crate::config::SCAN_STAGGER_DELAY_MS;
use crate::package::Package;
use crate::scan::dispatcher::{Dispatcher, ScanReport};
use crate::version::error::ScanError;
use crate::version::options::ScanOptions;

/// One package to scan and how
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub package: Package,
    pub options: ScanOptions,
    /// Handler to force, bypassing automatic selection
    pub handler: Option<String>,
}

impl ScanRequest {
    pub fn new(package: Package, options: ScanOptions) -> Self {
        Self {
            package,
            options,
            handler: None,
        }
    }

    pub fn forced(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }
}

/// Scan every request, returning results in request order
///
/// Scans run in parallel with staggered start times to avoid hammering
/// upstream sites. A failed package is logged and reported in its slot
/// without affecting the others.
pub async fn scan_packages(
    dispatcher: &Dispatcher,
    requests: &[ScanRequest],
) -> Vec<Result<ScanReport, ScanError>> {
    scan_packages_with_cancel(dispatcher, requests, std::future::pending()).await
}

/// Like [`scan_packages`], stopping every scan once `cancel` resolves
///
/// Each package keeps what its handlers reported before cancellation;
/// unfinished handlers show up as cancelled failures. `cancel` is cloned
/// once per package, so it should be a shared future.
pub async fn scan_packages_with_cancel<C>(
    dispatcher: &Dispatcher,
    requests: &[ScanRequest],
    cancel: C,
) -> Vec<Result<ScanReport, ScanError>>
where
    C: Future<Output = ()> + Clone,
{
    let futures = requests.iter().enumerate().map(|(i, request)| {
        let delay = Duration::from_millis(SCAN_STAGGER_DELAY_MS * i as u64);
        let cancel = cancel.clone();
        async move {
            sleep(delay).await;
            dispatcher
                .scan_with_cancel(
                    &request.package,
                    &request.options,
                    request.handler.as_deref(),
                    cancel,
                )
                .await
                .inspect_err(|e| error!("Failed to scan {}: {}", request.package, e))
        }
    });

    join_all(futures).await
}
