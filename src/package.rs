//! Package identity as known to the package manager

use std::fmt;

use thiserror::Error;

use crate::version::gentoo;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("Invalid package atom: {0}")]
    InvalidAtom(String),
}

/// A package at its currently known version
///
/// Immutable input to a scan; handlers only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    category: String,
    name: String,
    version: String,
    revision: Option<u32>,
    urls: Vec<String>,
}

impl Package {
    /// Create a package from `category/name` and a canonical version
    pub fn new(cp: &str, version: &str) -> Result<Self, PackageError> {
        let (category, name) = split_cp(cp)?;
        if !gentoo::is_valid(version) {
            return Err(PackageError::InvalidAtom(format!("{}-{}", cp, version)));
        }

        Ok(Self {
            category: category.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            revision: None,
            urls: Vec::new(),
        })
    }

    /// Parse `category/name-version[-rN]`
    pub fn from_cpv(cpv: &str) -> Result<Self, PackageError> {
        let (cp, version, revision) = split_cpv(cpv)?;
        let mut package = Self::new(cp, version)?;
        package.revision = revision;
        Ok(package)
    }

    /// Attach the package's known source locations (SRC_URI, HOMEPAGE)
    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `category/name`
    pub fn cp(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Version without revision
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.category, self.name, self.version)?;
        if let Some(rev) = self.revision {
            write!(f, "-r{}", rev)?;
        }
        Ok(())
    }
}

fn split_cp(cp: &str) -> Result<(&str, &str), PackageError> {
    match cp.split_once('/') {
        Some((category, name))
            if !category.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((category, name))
        }
        _ => Err(PackageError::InvalidAtom(cp.to_string())),
    }
}

/// Split `category/name-version[-rN]` into `(category/name, version, revision)`
///
/// Names may contain hyphens, so the version is the last segment that
/// parses as a canonical version.
pub fn split_cpv(cpv: &str) -> Result<(&str, &str, Option<u32>), PackageError> {
    let invalid = || PackageError::InvalidAtom(cpv.to_string());

    let (rest, revision) = match cpv.rsplit_once('-') {
        Some((rest, rev))
            if rev.len() > 1
                && rev.starts_with('r')
                && rev[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            (rest, Some(rev[1..].parse::<u32>().map_err(|_| invalid())?))
        }
        _ => (cpv, None),
    };

    let (cp, version) = rest.rsplit_once('-').ok_or_else(invalid)?;
    if !gentoo::is_valid(version) {
        return Err(invalid());
    }
    split_cp(cp)?;

    Ok((cp, version, revision))
}
