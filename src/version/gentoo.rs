//! Canonical version grammar of the package manager
//!
//! Versions follow the PMS syntax without revision:
//! `1.2.3`, `1.0b`, `2.0_rc1`, `1.4_p20240101`, `3.1_alpha2_p1`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)([a-z]?)((?:_(?:alpha|beta|pre|rc|p)\d*)*)$")
        .expect("version grammar is a valid regex")
});

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_(alpha|beta|pre|rc|p)(\d*)").expect("suffix grammar is a valid regex")
});

/// Release suffix, declared in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "alpha" => Some(SuffixKind::Alpha),
            "beta" => Some(SuffixKind::Beta),
            "pre" => Some(SuffixKind::Pre),
            "rc" => Some(SuffixKind::Rc),
            "p" => Some(SuffixKind::P),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Suffix {
    kind: SuffixKind,
    /// Digits as written; empty means 0
    number: String,
}

/// A parsed canonical version
#[derive(Debug, Clone)]
pub struct GentooVersion {
    raw: String,
    components: Vec<String>,
    letter: Option<char>,
    suffixes: Vec<Suffix>,
}

impl GentooVersion {
    /// Parse a version string, returning None if it is outside the grammar
    pub fn parse(version: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(version)?;

        let components = caps[1].split('.').map(str::to_string).collect();
        let letter = caps[2].chars().next();
        let suffixes = SUFFIX_RE
            .captures_iter(&caps[3])
            .filter_map(|c| {
                Some(Suffix {
                    kind: SuffixKind::parse(&c[1])?,
                    number: c[2].to_string(),
                })
            })
            .collect();

        Some(Self {
            raw: version.to_string(),
            components,
            letter,
            suffixes,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Leading numeric component as written (e.g. "20240101" for a snapshot)
    pub fn major(&self) -> &str {
        &self.components[0]
    }
}

/// Returns true if the string is a canonical version
pub fn is_valid(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Compare two version strings under the canonical ordering
///
/// Returns None if either side fails to parse.
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    let a = GentooVersion::parse(a)?;
    let b = GentooVersion::parse(b)?;
    Some(a.cmp(&b))
}

/// Compare two digit strings numerically without overflowing
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_component(a: &str, b: &str) -> Ordering {
    if a.starts_with('0') || b.starts_with('0') {
        a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
    } else {
        cmp_numeric(a, b)
    }
}

impl Ord for GentooVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = cmp_numeric(&self.components[0], &other.components[0]);
        if ord != Ordering::Equal {
            return ord;
        }

        for (a, b) in self.components[1..].iter().zip(&other.components[1..]) {
            let ord = cmp_component(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        let ord = self.components.len().cmp(&other.components.len());
        if ord != Ordering::Equal {
            return ord;
        }

        let ord = self.letter.cmp(&other.letter);
        if ord != Ordering::Equal {
            return ord;
        }

        for (a, b) in self.suffixes.iter().zip(&other.suffixes) {
            let ord = a
                .kind
                .cmp(&b.kind)
                .then_with(|| cmp_numeric(&a.number, &b.number));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        // One suffix list is a prefix of the other: only a trailing _p makes
        // the longer one greater.
        let common = self.suffixes.len().min(other.suffixes.len());
        match (self.suffixes.get(common), other.suffixes.get(common)) {
            (Some(s), None) if s.kind == SuffixKind::P => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, Some(s)) if s.kind == SuffixKind::P => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for GentooVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GentooVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GentooVersion {}

impl fmt::Display for GentooVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
