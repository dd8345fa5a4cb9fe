//! Per-scan options passed from the dispatcher to handlers and the mangler

use serde::Deserialize;

use crate::version::error::OptionsError;
use crate::version::mangling::RuleSet;

/// Options for one package scan
///
/// Rules are compiled on construction, so a value of this type is always
/// valid. Deserializing checks the rules too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawScanOptions")]
pub struct ScanOptions {
    data: Option<String>,
    version_rules: RuleSet,
    url_rules: RuleSet,
}

/// Uncompiled form as found in configuration files
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScanOptions {
    data: Option<String>,
    #[serde(alias = "versionMangle")]
    versionmangle: Vec<String>,
    #[serde(alias = "downloadUrlMangle")]
    downloadurlmangle: Vec<String>,
}

impl TryFrom<RawScanOptions> for ScanOptions {
    type Error = OptionsError;

    fn try_from(raw: RawScanOptions) -> Result<Self, Self::Error> {
        Self::new(raw.data, &raw.versionmangle, &raw.downloadurlmangle)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            data: None,
            version_rules: RuleSet::default_versions(),
            url_rules: RuleSet::default(),
        }
    }
}

impl ScanOptions {
    pub fn new<V: AsRef<str>, U: AsRef<str>>(
        data: Option<String>,
        versionmangle: &[V],
        downloadurlmangle: &[U],
    ) -> Result<Self, OptionsError> {
        Ok(Self {
            data,
            version_rules: RuleSet::for_versions(versionmangle)?,
            url_rules: RuleSet::for_urls(downloadurlmangle)?,
        })
    }

    /// Opaque per-handler payload (distribution name, project slug, ...)
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Copy of these options with the payload replaced
    pub fn with_data(&self, data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..self.clone()
        }
    }

    pub fn version_rules(&self) -> &RuleSet {
        &self.version_rules
    }

    pub fn url_rules(&self) -> &RuleSet {
        &self.url_rules
    }
}
