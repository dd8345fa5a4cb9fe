//! Immutable, priority-ordered set of handlers

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::config::{ConfigError, ScanConfig};
use crate::version::fetcher::Fetcher;
use crate::version::filter::VersionFilter;
use crate::version::handler::Handler;
use crate::version::handlers::freecode::DEFAULT_FREECODE_BASE_URL;
use crate::version::handlers::github::DEFAULT_GITHUB_API_URL;
use crate::version::handlers::pypi::DEFAULT_PYPI_BASE_URL;
use crate::version::handlers::{FreecodeHandler, GitHubHandler, PypiHandler};

/// All known handlers, sorted by priority (highest first)
///
/// Ties keep declaration order. Built once and shared read-only across
/// concurrent scans.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        let mut seen = HashSet::new();
        let mut handlers: Vec<Arc<dyn Handler>> = handlers
            .into_iter()
            .filter(|h| {
                let name = h.descriptor().name;
                let fresh = seen.insert(name);
                if !fresh {
                    warn!("Ignoring duplicate handler registration: {}", name);
                }
                fresh
            })
            .collect();

        handlers.sort_by_key(|h| Reverse(h.descriptor().priority));

        Self { handlers }
    }

    /// Handlers in scan order
    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|h| h.descriptor().name == name)
    }

    /// Position of a handler in scan order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.handlers
            .iter()
            .position(|h| h.descriptor().name == name)
    }

    /// Priority and scan position of a handler, used for ranking
    pub fn rank(&self, name: &str) -> Option<(i32, usize)> {
        let position = self.position(name)?;
        Some((self.handlers[position].descriptor().priority, position))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Create the registry of every enabled built-in handler
pub fn create_default_registry(
    config: &ScanConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Result<HandlerRegistry, ConfigError> {
    let filter = Arc::new(VersionFilter::from_atoms(&config.blacklist_versions)?);
    let timeout = config.fetch_timeout();
    let handlers_config = &config.handlers;

    let mut handlers: Vec<Arc<dyn Handler>> = Vec::new();

    if handlers_config.pypi.enabled {
        handlers.push(Arc::new(PypiHandler::new(
            fetcher.clone(),
            filter.clone(),
            handlers_config
                .pypi
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_PYPI_BASE_URL),
            timeout,
        )));
    }

    if handlers_config.github.enabled {
        handlers.push(Arc::new(GitHubHandler::new(
            fetcher.clone(),
            filter.clone(),
            handlers_config
                .github
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_GITHUB_API_URL),
            timeout,
        )));
    }

    if handlers_config.freecode.enabled {
        handlers.push(Arc::new(FreecodeHandler::new(
            fetcher,
            filter,
            handlers_config
                .freecode
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_FREECODE_BASE_URL),
            timeout,
        )));
    }

    Ok(HandlerRegistry::new(handlers))
}
