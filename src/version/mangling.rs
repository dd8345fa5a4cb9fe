//! Version and download URL mangling
//!
//! Upstream version tokens are rewritten into the canonical grammar by an
//! ordered list of rules. Built-in rules:
//!
//! - `cleanup`: trims, strips a leading `v`, turns `1_2-3` into `1.2.3`
//! - `gentoo`: translates pre/post-release suffixes (`1.0b2` -> `1.0_beta2`)
//! - `nomangle`: disables the built-in rules
//!
//! Any other rule is a sed-style substitution: `s/pattern/replacement/`,
//! `s|pattern|replacement|` or `s#pattern#replacement#`, with `$1`/`\1`
//! back-references. `\$` in a replacement is a literal dollar sign.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::version::error::OptionsError;
use crate::version::gentoo;
use crate::version::options::ScanOptions;

/// A single compiled mangling rule
#[derive(Debug, Clone)]
pub enum ManglingRule {
    Gentoo,
    Cleanup,
    NoMangle,
    Substitute { pattern: Regex, replacement: String },
}

impl ManglingRule {
    pub fn parse(rule: &str) -> Result<Self, OptionsError> {
        match rule.trim() {
            "gentoo" => Ok(ManglingRule::Gentoo),
            "cleanup" => Ok(ManglingRule::Cleanup),
            "nomangle" => Ok(ManglingRule::NoMangle),
            other => parse_substitution(other),
        }
    }

    fn is_builtin(&self) -> bool {
        !matches!(self, ManglingRule::Substitute { .. })
    }

    fn apply(&self, input: &str) -> String {
        match self {
            ManglingRule::Gentoo => gentoo_mangle_version(input),
            ManglingRule::Cleanup => cleanup_mangle_version(input),
            ManglingRule::NoMangle => input.to_string(),
            ManglingRule::Substitute {
                pattern,
                replacement,
            } => pattern.replace_all(input, replacement.as_str()).into_owned(),
        }
    }
}

/// Ordered, compiled list of rules together with the text they came from
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    sources: Vec<String>,
    rules: Vec<ManglingRule>,
}

impl RuleSet {
    /// Rules applied to version tokens when nothing is configured
    pub fn default_versions() -> Self {
        Self {
            sources: Vec::new(),
            rules: vec![ManglingRule::Cleanup, ManglingRule::Gentoo],
        }
    }

    /// Compile version rules
    ///
    /// Custom substitutions run before the built-in `cleanup, gentoo` chain
    /// unless the configuration names a built-in rule itself, in which case
    /// its order is kept verbatim. `nomangle` drops the built-in chain.
    pub fn for_versions<S: AsRef<str>>(rules: &[S]) -> Result<Self, OptionsError> {
        let sources: Vec<String> = rules.iter().map(|r| r.as_ref().to_string()).collect();
        let parsed = sources
            .iter()
            .map(|r| ManglingRule::parse(r))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = if parsed.iter().any(|r| matches!(r, ManglingRule::NoMangle)) {
            parsed
                .into_iter()
                .filter(|r| !matches!(r, ManglingRule::NoMangle))
                .collect()
        } else if parsed.iter().any(ManglingRule::is_builtin) {
            parsed
        } else {
            let mut rules = parsed;
            rules.extend(Self::default_versions().rules);
            rules
        };

        Ok(Self { sources, rules })
    }

    /// Compile download URL rules; only substitutions are meaningful here
    pub fn for_urls<S: AsRef<str>>(rules: &[S]) -> Result<Self, OptionsError> {
        let sources: Vec<String> = rules.iter().map(|r| r.as_ref().to_string()).collect();
        let rules = sources
            .iter()
            .map(|source| {
                let rule = ManglingRule::parse(source)?;
                if rule.is_builtin() {
                    return Err(OptionsError::MisplacedRule {
                        rule: source.clone(),
                        kind: "downloadurlmangle",
                    });
                }
                Ok(rule)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { sources, rules })
    }

    /// The rules as configured, before defaults were added
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn apply(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |acc, rule| rule.apply(&acc))
    }
}

impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources && self.rules.len() == other.rules.len()
    }
}

/// Normalize an upstream version token into the canonical grammar
///
/// Returns None if the rewritten token is still not a valid version.
pub fn mangle_version(up_pv: &str, options: &ScanOptions) -> Option<String> {
    let pv = options.version_rules().apply(up_pv);
    if gentoo::is_valid(&pv) {
        Some(pv)
    } else {
        debug!("Dropping '{}': mangled to '{}', not a version", up_pv, pv);
        None
    }
}

/// Rewrite a download URL with the configured substitutions
pub fn mangle_url(url: &str, options: &ScanOptions) -> String {
    options.url_rules().apply(url)
}

fn parse_substitution(rule: &str) -> Result<ManglingRule, OptionsError> {
    let invalid = |reason: &str| OptionsError::InvalidRule {
        rule: rule.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = rule.chars();
    if chars.next() != Some('s') {
        return Err(invalid("expected s/pattern/replacement/"));
    }
    let delim = match chars.next() {
        Some(d @ ('/' | '|' | '#')) => d,
        _ => return Err(invalid("expected '/', '|' or '#' after 's'")),
    };

    let parts = split_unescaped(chars.as_str(), delim);
    let [pattern, replacement, flags] = parts.as_slice() else {
        return Err(invalid("expected exactly three delimiters"));
    };
    if pattern.is_empty() {
        return Err(invalid("empty pattern"));
    }

    let mut prefix = String::new();
    for flag in flags.chars() {
        match flag {
            'g' => {}
            'i' => prefix.push_str("(?i)"),
            other => return Err(invalid(&format!("unsupported flag '{}'", other))),
        }
    }

    let pattern =
        Regex::new(&format!("{}{}", prefix, pattern)).map_err(|e| invalid(&e.to_string()))?;

    Ok(ManglingRule::Substitute {
        pattern,
        replacement: convert_replacement(replacement),
    })
}

/// Split on `delim`, unescaping `\delim` and keeping other escapes intact
fn split_unescaped(input: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&delim) => {
                current.push(delim);
                chars.next();
            }
            '\\' => {
                current.push('\\');
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c == delim => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);

    parts
}

/// Translate perl-style back-references into the regex crate's syntax
fn convert_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' | '\\' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut group = String::new();
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    group.push(d);
                }
                out.push_str(&format!("${{{}}}", group));
            }
            '$' if chars.peek() == Some(&'{') => out.push('$'),
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(next) => out.push(next),
                None => {}
            },
            c => out.push(c),
        }
    }

    out
}

static SEPARATOR_BETWEEN_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[-_](\d)").expect("valid separator regex"));

/// Strip a leading `v` and collapse `-`/`_` between digits into `.`
pub fn cleanup_mangle_version(version: &str) -> String {
    if gentoo::is_valid(version) {
        return version.to_string();
    }

    let mut pv = version.trim();
    if let Some(rest) = pv.strip_prefix(['v', 'V'])
        && rest.starts_with(|c: char| c.is_ascii_digit())
    {
        pv = rest;
    }

    // Matches can't overlap, so "1-2-3" needs a second pass.
    let mut pv = pv.to_string();
    loop {
        let next = SEPARATOR_BETWEEN_DIGITS.replace_all(&pv, "$1.$2").into_owned();
        if next == pv {
            return pv;
        }
        pv = next;
    }
}

static DEV_SNAPSHOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)([._-]*(?:dev|devel|snapshot)[._-]*r?)([0-9]*)$")
        .expect("valid dev snapshot regex")
});

static REVISION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)([._-]*(?:r|patch|p)[._-]*)([0-9]*)$").expect("valid revision regex")
});

static BAD_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[._-]*(?:final|stable)$").expect("valid suffix regex")
});

/// Suffix patterns, tried in order; long spellings go first so that
/// `1.0beta2` is not read as `1.0bet` + `a2`.
static SUFFIX_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("_pre", r"(?i)^(.*?)([._-]*(?:pre|preview)[._-]*)([0-9]*)$"),
        ("_alpha", r"(?i)^(.*?)([._-]*(?:alpha|test)[._-]*)([0-9]*)$"),
        ("_beta", r"(?i)^(.*?)([._-]*beta[._-]*)([0-9]*)$"),
        ("_rc", r"(?i)^(.*?)([._-]*rc[._-]*)([0-9]*)$"),
        ("_alpha", r"(?i)^(.*?)([._-]*a[._-]*)([0-9]*)$"),
        ("_beta", r"(?i)^(.*?)([._-]*b[._-]*)([0-9]*)$"),
        ("_rc", r"(?i)^(.*?)([._-]*c[._-]*)([0-9]*)$"),
    ]
    .into_iter()
    .map(|(suffix, re)| (suffix, Regex::new(re).expect("valid suffix pattern")))
    .collect()
});

/// Translate well-known upstream suffix schemes into canonical suffixes
///
/// - `1.0a1`, `1.0-a1`, `1.0alpha1` -> `1.0_alpha1`
/// - `1.0b1`, `1.0-beta1` -> `1.0_beta1`
/// - `1.0rc1`, `1.0-rc1`, `1.0c1` -> `1.0_rc1`
/// - `1.0dev-r1234`, `1.0.dev-20091118`, `1.0pre2` -> `1.0_pre...`
/// - `1.0.dev`, `1.0-SNAPSHOT`, `1.0-devel` -> `1.0_pre`
/// - `1.0-r3`, `1.0p3`, `1.0-patch3` -> `1.0_p3`
/// - `1.0-final`, `1.0-stable` -> `1.0`
pub fn gentoo_mangle_version(up_pv: &str) -> String {
    if gentoo::is_valid(up_pv) {
        return up_pv.to_string();
    }

    if let Some(caps) = DEV_SNAPSHOT.captures(up_pv) {
        return format!("{}_pre{}", &caps[1], &caps[3]);
    }

    let (base, post) = match REVISION_SUFFIX.captures(up_pv) {
        Some(caps) => (caps[1].to_string(), format!("_p{}", &caps[3])),
        None => (up_pv.to_string(), String::new()),
    };

    let matched = SUFFIX_PATTERNS
        .iter()
        .find_map(|(suffix, re)| re.captures(&base).map(|caps| (*suffix, caps)));

    let pv = match matched {
        Some((suffix, caps)) => format!("{}{}{}", &caps[1], suffix, &caps[3]),
        None => match BAD_SUFFIX.find(&base) {
            Some(m) => base[..m.start()].to_string(),
            None => base,
        },
    };

    pv + &post
}
