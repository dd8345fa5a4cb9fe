//! Decides whether a normalized candidate is worth reporting

use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::package::{PackageError, split_cpv};
use crate::version::gentoo::GentooVersion;

/// Comparison operator of a blacklist atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Less,
    LessOrEqual,
    Equal,
    /// `=cat/pkg-1.2*`
    EqualGlob,
    /// `~cat/pkg-1.2`: any revision of the version
    Tilde,
    GreaterOrEqual,
    Greater,
}

/// Blacklist entry such as `<dev-python/foo-2.0` or a bare `cat/pkg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistRule {
    atom: String,
    cp: String,
    constraint: Option<(Operator, String)>,
}

impl BlacklistRule {
    pub fn parse(atom: &str) -> Result<Self, PackageError> {
        let atom = atom.trim();
        let invalid = || PackageError::InvalidAtom(atom.to_string());

        let operators = [
            ("<=", Operator::LessOrEqual),
            (">=", Operator::GreaterOrEqual),
            ("<", Operator::Less),
            (">", Operator::Greater),
            ("=", Operator::Equal),
            ("~", Operator::Tilde),
        ];

        let Some((op, rest)) = operators
            .iter()
            .find_map(|(prefix, op)| atom.strip_prefix(*prefix).map(|rest| (*op, rest)))
        else {
            if atom.split('/').count() != 2 || atom.split('/').any(str::is_empty) {
                return Err(invalid());
            }
            return Ok(Self {
                atom: atom.to_string(),
                cp: atom.to_string(),
                constraint: None,
            });
        };

        let (op, rest) = match rest.strip_suffix('*') {
            Some(prefix) if op == Operator::Equal => (Operator::EqualGlob, prefix),
            Some(_) => return Err(invalid()),
            None => (op, rest),
        };

        let (cp, version, revision) = split_cpv(rest).map_err(|_| invalid())?;
        if revision.is_some() && op == Operator::Tilde {
            return Err(invalid());
        }

        Ok(Self {
            atom: atom.to_string(),
            cp: cp.to_string(),
            constraint: Some((op, version.to_string())),
        })
    }

    fn matches(&self, cp: &str, version: &GentooVersion) -> bool {
        if self.cp != cp {
            return false;
        }
        let Some((op, bound)) = &self.constraint else {
            return true;
        };
        if *op == Operator::EqualGlob {
            return version.as_str().starts_with(bound.as_str());
        }
        let Some(bound) = GentooVersion::parse(bound) else {
            return false;
        };

        let ord = version.cmp(&bound);
        match op {
            Operator::Less => ord == Ordering::Less,
            Operator::LessOrEqual => ord != Ordering::Greater,
            Operator::Equal | Operator::Tilde => ord == Ordering::Equal,
            Operator::GreaterOrEqual => ord != Ordering::Less,
            Operator::Greater => ord == Ordering::Greater,
            Operator::EqualGlob => false,
        }
    }
}

/// The single choke point between a handler's mangled tokens and its results
#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    blacklist: Vec<BlacklistRule>,
}

impl VersionFilter {
    pub fn new(blacklist: Vec<BlacklistRule>) -> Self {
        Self { blacklist }
    }

    /// Build a filter from blacklist atoms, failing on the first malformed one
    pub fn from_atoms<S: AsRef<str>>(atoms: &[S]) -> Result<Self, PackageError> {
        let blacklist = atoms
            .iter()
            .map(|a| BlacklistRule::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(blacklist))
    }

    /// Returns true if the candidate should be reported
    ///
    /// `candidate` is None when normalization failed.
    pub fn keep(&self, cp: &str, known: &str, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let Some(candidate_version) = GentooVersion::parse(candidate) else {
            debug!("{}: '{}' is not a version", cp, candidate);
            return false;
        };
        let Some(known_version) = GentooVersion::parse(known) else {
            debug!("{}: known version '{}' is not comparable", cp, known);
            return false;
        };

        if candidate_version <= known_version {
            return false;
        }

        if let Some(rule) = self
            .blacklist
            .iter()
            .find(|rule| rule.matches(cp, &candidate_version))
        {
            info!("{}-{} is blacklisted by rule {}", cp, candidate, rule.atom);
            return false;
        }

        if is_nightly(&known_version, &candidate_version) {
            debug!("{}: skipping nightly build {}", cp, candidate);
            return false;
        }

        true
    }
}

/// A date-stamped candidate for a package that isn't versioned by date
fn is_nightly(known: &GentooVersion, candidate: &GentooVersion) -> bool {
    is_date(candidate.major()) && !is_date(known.major())
}

fn is_date(component: &str) -> bool {
    component.len() == 8 && NaiveDate::parse_from_str(component, "%Y%m%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CP: &str = "dev-python/foo";

    #[rstest]
    #[case("1.2.0", Some("1.3.0"), true)]
    #[case("1.2.0", Some("1.2.0"), false)]
    #[case("1.2.0", Some("1.1.0"), false)]
    #[case("1.2.0", Some("1.2"), false)]
    #[case("2.0", Some("2.0_rc1"), false)]
    #[case("2.0_rc1", Some("2.0"), true)]
    #[case("2.0", Some("2.0_p1"), true)]
    #[case("1.2.0", None, false)]
    #[case("1.2.0", Some("v1.3"), false)]
    #[case("1.2.0", Some("20240101"), false)]
    #[case("20230101", Some("20240101"), true)]
    #[case("1.2.0", Some("99999999"), true)]
    fn keep_without_blacklist(
        #[case] known: &str,
        #[case] candidate: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(VersionFilter::default().keep(CP, known, candidate), expected);
    }

    #[rstest]
    #[case("<dev-python/foo-2.0", "1.5", false)]
    #[case("<dev-python/foo-2.0", "2.0", true)]
    #[case("<=dev-python/foo-2.0", "2.0", false)]
    #[case(">=dev-python/foo-3", "3.0", false)]
    #[case(">dev-python/foo-3.0", "3.0", true)]
    #[case("=dev-python/foo-1.5", "1.5", false)]
    #[case("~dev-python/foo-1.5", "1.6", true)]
    #[case("=dev-python/foo-1.5*", "1.5.3", false)]
    #[case("=dev-python/foo-1.5*", "1.6", true)]
    #[case("dev-python/foo", "9.9", false)]
    #[case("dev-python/bar", "9.9", true)]
    fn keep_honours_blacklist(#[case] atom: &str, #[case] candidate: &str, #[case] expected: bool) {
        let filter = VersionFilter::from_atoms(&[atom]).unwrap();
        assert_eq!(filter.keep(CP, "1.0", Some(candidate)), expected);
    }

    #[rstest]
    #[case("dev-python")]
    #[case("<dev-python/foo")]
    #[case("<dev-python/foo-1.0*")]
    #[case("~dev-python/foo-1.0-r1")]
    #[case("/foo")]
    fn blacklist_rejects_malformed_atoms(#[case] atom: &str) {
        assert!(BlacklistRule::parse(atom).is_err());
    }
}
