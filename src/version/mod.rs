//! Version discovery layer
//!
//! This module provides the building blocks a scan is made of: fetching
//! upstream listings, turning upstream version tokens into canonical
//! versions, and deciding which of them are worth reporting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Handler   │────▶│  Mangling   │────▶│   Filter    │
//! │  (listing)  │     │ (normalize) │     │  (newer?)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │                   │
//!        ▼                   ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Fetcher   │     │   Options   │     │   Gentoo    │
//! │   (HTTP)    │     │   (rules)   │     │  (grammar)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`]: Error types for fetchers, handlers and scans
//! - [`fetcher`]: Fetcher trait and the reqwest-backed implementation
//! - [`filter`]: Newer-than-known check, blacklist and nightly rejection
//! - [`gentoo`]: Canonical version grammar and ordering
//! - [`handler`]: Handler trait, descriptors and candidates
//! - [`handlers`]: Concrete handlers (PyPI, GitHub, Freecode)
//! - [`mangling`]: Version and download URL rewrite rules
//! - [`options`]: Per-scan options

pub mod error;
pub mod fetcher;
pub mod filter;
pub mod gentoo;
pub mod handler;
pub mod handlers;
pub mod mangling;
pub mod options;
