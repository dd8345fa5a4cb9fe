//! Select handlers for a package, run them concurrently and rank the result

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::package::Package;
use crate::scan::aggregate::aggregate;
use crate::scan::registry::HandlerRegistry;
use crate::version::error::{HandlerError, ScanError};
use crate::version::handler::{Candidate, Handler};
use crate::version::options::ScanOptions;

/// A handler that contributed nothing because it failed
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: String,
    pub error: HandlerError,
}

/// Outcome of scanning one package
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Ranked, deduplicated candidates
    pub candidates: Vec<Candidate>,
    pub failures: Vec<HandlerFailure>,
}

/// One planned handler invocation
struct Job {
    handler: Arc<dyn Handler>,
    /// Source URL for a by-URL scan, `None` for a by-package scan
    url: Option<String>,
}

enum Interrupt {
    Deadline,
    Cancelled,
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    handler_timeout: Duration,
    scan_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        handler_timeout: Duration,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            handler_timeout,
            scan_timeout,
        }
    }

    pub fn from_config(registry: Arc<HandlerRegistry>, config: &ScanConfig) -> Self {
        Self::new(registry, config.handler_timeout(), config.scan_timeout())
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Scan one package, optionally forcing a single handler by name
    pub async fn scan(
        &self,
        package: &Package,
        options: &ScanOptions,
        forced: Option<&str>,
    ) -> Result<ScanReport, ScanError> {
        self.scan_with_cancel(package, options, forced, std::future::pending())
            .await
    }

    /// Like [`scan`](Self::scan), stopping early once `cancel` resolves
    ///
    /// Candidates collected before cancellation are kept; handlers still
    /// running are reported as [`HandlerError::Cancelled`].
    pub async fn scan_with_cancel<C>(
        &self,
        package: &Package,
        options: &ScanOptions,
        forced: Option<&str>,
        cancel: C,
    ) -> Result<ScanReport, ScanError>
    where
        C: Future<Output = ()>,
    {
        let Some(name) = forced else {
            let jobs = self.plan(package);
            return Ok(self.run(package, options, jobs, cancel).await);
        };

        let handler = self
            .registry
            .get(name)
            .ok_or_else(|| ScanError::UnknownHandler(name.to_string()))?;
        let jobs = vec![Job {
            handler: handler.clone(),
            url: None,
        }];

        let mut report = self.run(package, options, jobs, cancel).await;
        match report.failures.pop() {
            Some(HandlerFailure {
                handler,
                error: HandlerError::Configuration(message),
            }) => Err(ScanError::HandlerConfiguration { handler, message }),
            Some(failure) => {
                report.failures.push(failure);
                Ok(report)
            }
            None => Ok(report),
        }
    }

    /// Decide which handlers run, each at most once
    fn plan(&self, package: &Package) -> Vec<Job> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for url in package.urls() {
            for handler in self.registry.handlers() {
                let descriptor = handler.descriptor();
                if !descriptor.capabilities.by_url || seen.contains(descriptor.name) {
                    continue;
                }
                if handler.can_handle(package, Some(url)) {
                    debug!("{} claims {} for {}", descriptor.name, url, package);
                    seen.insert(descriptor.name);
                    jobs.push(Job {
                        handler: handler.clone(),
                        url: Some(url.clone()),
                    });
                }
            }
        }

        if jobs.is_empty() {
            jobs = self
                .registry
                .handlers()
                .iter()
                .filter(|h| h.descriptor().capabilities.by_package && h.can_handle(package, None))
                .map(|handler| Job {
                    handler: handler.clone(),
                    url: None,
                })
                .collect();
        }

        jobs
    }

    async fn run<C>(
        &self,
        package: &Package,
        options: &ScanOptions,
        jobs: Vec<Job>,
        cancel: C,
    ) -> ScanReport
    where
        C: Future<Output = ()>,
    {
        if jobs.is_empty() {
            info!("No handler applies to {}", package);
            return ScanReport::default();
        }

        let names: Vec<&'static str> = jobs.iter().map(|j| j.handler.descriptor().name).collect();
        let handler_timeout = self.handler_timeout;

        let mut pending: FuturesUnordered<_> = jobs
            .into_iter()
            .map(|job| async move {
                let name = job.handler.descriptor().name;
                let scan = match &job.url {
                    Some(url) => job.handler.scan_url(package, url, options),
                    None => job.handler.scan_pkg(package, options),
                };
                let result = tokio::time::timeout(handler_timeout, scan)
                    .await
                    .unwrap_or(Err(HandlerError::TimedOut(handler_timeout)));
                (name, result)
            })
            .collect();

        let deadline = tokio::time::sleep(self.scan_timeout);
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        let mut finished = HashSet::new();

        let interrupt = loop {
            tokio::select! {
                biased;

                next = pending.next() => match next {
                    Some((name, Ok(found))) => {
                        debug!("{} found {} candidates for {}", name, found.len(), package);
                        finished.insert(name);
                        candidates.extend(found);
                    }
                    Some((name, Err(error))) => {
                        warn!("Handler {} failed for {}: {}", name, package, error);
                        finished.insert(name);
                        failures.push(HandlerFailure {
                            handler: name.to_string(),
                            error,
                        });
                    }
                    None => break None,
                },
                _ = &mut cancel => break Some(Interrupt::Cancelled),
                _ = &mut deadline => break Some(Interrupt::Deadline),
            }
        };

        // Dropping the remaining futures aborts their in-flight fetches
        drop(pending);

        if let Some(interrupt) = interrupt {
            for name in names.into_iter().filter(|n| !finished.contains(n)) {
                let error = match interrupt {
                    Interrupt::Deadline => HandlerError::TimedOut(self.scan_timeout),
                    Interrupt::Cancelled => HandlerError::Cancelled,
                };
                warn!("Handler {} did not finish for {}: {}", name, package, error);
                failures.push(HandlerFailure {
                    handler: name.to_string(),
                    error,
                });
            }
        }

        let candidates = aggregate(&self.registry, candidates);
        info!(
            "Scanned {}: {} candidates, {} handler failures",
            package,
            candidates.len(),
            failures.len()
        );

        ScanReport {
            candidates,
            failures,
        }
    }
}
