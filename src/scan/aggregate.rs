//! Merge and rank candidates from every handler of one scan

use std::cmp::{Ordering, Reverse};

use indexmap::IndexMap;

use crate::scan::registry::HandlerRegistry;
use crate::version::gentoo::GentooVersion;
use crate::version::handler::Candidate;

/// Collapse duplicates and rank candidates best-first
///
/// Entries sharing both handler and version become one entry whose URLs are
/// the union of every reported URL, in first-seen order. Entries from
/// different handlers are never merged.
///
/// Ranking is confidence, then handler priority, then registry position,
/// then version (all descending except position), then URL.
pub fn aggregate(registry: &HandlerRegistry, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: IndexMap<(String, String), (Candidate, Vec<String>)> = IndexMap::new();

    for candidate in candidates {
        let key = (candidate.handler.clone(), candidate.version.clone());
        let urls: Vec<String> = candidate.urls().map(str::to_string).collect();

        match merged.get_mut(&key) {
            Some((_, known)) => {
                for url in urls {
                    if !known.contains(&url) {
                        known.push(url);
                    }
                }
            }
            None => {
                let mut unique = Vec::with_capacity(urls.len());
                for url in urls {
                    if !unique.contains(&url) {
                        unique.push(url);
                    }
                }
                merged.insert(key, (candidate, unique));
            }
        }
    }

    let mut ranked: Vec<Candidate> = merged
        .into_values()
        .map(|(mut candidate, urls)| {
            candidate.url = urls.join(" ");
            candidate
        })
        .collect();

    ranked.sort_by(|a, b| compare(registry, a, b));
    ranked
}

fn compare(registry: &HandlerRegistry, a: &Candidate, b: &Candidate) -> Ordering {
    let rank = |c: &Candidate| {
        let (priority, position) = registry
            .rank(&c.handler)
            .unwrap_or((i32::MIN, usize::MAX));
        (Reverse(c.confidence), Reverse(priority), position)
    };

    rank(a)
        .cmp(&rank(b))
        .then_with(|| compare_versions(&b.version, &a.version))
        .then_with(|| a.url.cmp(&b.url))
}

/// Unparseable versions sort below every valid one
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (GentooVersion::parse(a), GentooVersion::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::version::error::HandlerError;
    use crate::version::handler::{Capabilities, Handler, HandlerDescriptor};
    use crate::version::options::ScanOptions;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Arc;

    struct RankedHandler(HandlerDescriptor);

    #[async_trait]
    impl Handler for RankedHandler {
        fn descriptor(&self) -> HandlerDescriptor {
            self.0
        }

        fn can_handle(&self, _package: &Package, _url: Option<&str>) -> bool {
            false
        }

        async fn scan_pkg(
            &self,
            _package: &Package,
            _options: &ScanOptions,
        ) -> Result<Vec<Candidate>, HandlerError> {
            Ok(vec![])
        }
    }

    fn descriptor(name: &'static str, confidence: u8, priority: i32) -> HandlerDescriptor {
        HandlerDescriptor {
            name,
            confidence,
            priority,
            capabilities: Capabilities {
                by_url: true,
                by_package: true,
            },
        }
    }

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new(vec![
            Arc::new(RankedHandler(descriptor("a", 100, 90))),
            Arc::new(RankedHandler(descriptor("b", 80, 90))),
            Arc::new(RankedHandler(descriptor("c", 80, 50))),
            Arc::new(RankedHandler(descriptor("d", 80, 50))),
        ])
    }

    fn candidate(handler: &'static str, version: &str, url: &str) -> Candidate {
        let confidence = registry()
            .get(handler)
            .map(|h| h.descriptor().confidence)
            .unwrap_or(0);
        Candidate {
            url: url.to_string(),
            version: version.to_string(),
            handler: handler.to_string(),
            confidence,
        }
    }

    fn summary(candidates: &[Candidate]) -> Vec<(&str, &str)> {
        candidates
            .iter()
            .map(|c| (c.handler.as_str(), c.version.as_str()))
            .collect()
    }

    #[test]
    fn same_version_from_different_handlers_is_kept_twice() {
        let result = aggregate(
            &registry(),
            vec![
                candidate("b", "2.0_rc1", "http://mirror/foo-2.0-rc1.tar.gz"),
                candidate("a", "2.0_rc1", "http://upstream/foo-2.0-rc1.tar.gz"),
            ],
        );

        assert_eq!(summary(&result), vec![("a", "2.0_rc1"), ("b", "2.0_rc1")]);
        assert_eq!(result[0].confidence, 100);
        assert_eq!(result[1].confidence, 80);
    }

    #[test]
    fn same_handler_is_ordered_by_version_descending() {
        let result = aggregate(
            &registry(),
            vec![
                candidate("a", "1.9", "http://x/1.9"),
                candidate("a", "1.10", "http://x/1.10"),
                candidate("a", "1.10_rc1", "http://x/1.10rc1"),
                candidate("a", "1.10_p1", "http://x/1.10p1"),
            ],
        );

        assert_eq!(
            summary(&result),
            vec![("a", "1.10_p1"), ("a", "1.10"), ("a", "1.10_rc1"), ("a", "1.9")]
        );
    }

    #[test]
    fn duplicates_within_a_handler_union_their_urls() {
        let result = aggregate(
            &registry(),
            vec![
                candidate("a", "1.3", "http://x/foo-1.3.tar.gz"),
                candidate("a", "1.3", "http://x/foo-1.3.zip http://x/foo-1.3.tar.gz"),
                candidate("a", "1.3", "http://x/foo-1.3.tar.gz"),
            ],
        );

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].url, "http://x/foo-1.3.tar.gz http://x/foo-1.3.zip");
    }

    #[rstest]
    #[case::priority(vec!["c", "b"], vec!["b", "c"])]
    #[case::registry_position(vec!["d", "c"], vec!["c", "d"])]
    #[case::confidence_before_priority(vec!["b", "a"], vec!["a", "b"])]
    fn ties_are_broken_by_handler_rank(
        #[case] input: Vec<&'static str>,
        #[case] expected: Vec<&str>,
    ) {
        let candidates = input
            .into_iter()
            .map(|h| candidate(h, "1.0", "http://x/1.0"))
            .collect();

        let result = aggregate(&registry(), candidates);

        let handlers: Vec<&str> = result.iter().map(|c| c.handler.as_str()).collect();
        assert_eq!(handlers, expected);
    }

    #[test]
    fn output_does_not_depend_on_input_order() {
        let input = vec![
            candidate("c", "3.0", "http://x/c3"),
            candidate("a", "1.0", "http://x/a1"),
            candidate("b", "2.0", "http://x/b2"),
            candidate("a", "2.0", "http://x/a2"),
        ];
        let mut reversed = input.clone();
        reversed.reverse();

        assert_eq!(
            aggregate(&registry(), input),
            aggregate(&registry(), reversed)
        );
    }

    #[test]
    fn unknown_handlers_rank_last() {
        let result = aggregate(
            &registry(),
            vec![
                Candidate {
                    url: "http://x/z".to_string(),
                    version: "9.0".to_string(),
                    handler: "zzz".to_string(),
                    confidence: 80,
                },
                candidate("d", "1.0", "http://x/d"),
            ],
        );

        assert_eq!(summary(&result), vec![("d", "1.0"), ("zzz", "9.0")]);
    }

    #[rstest]
    #[case("1.0", "bogus", Ordering::Greater)]
    #[case("bogus", "1.0", Ordering::Less)]
    #[case("1.0.1", "1.0", Ordering::Greater)]
    fn compare_versions_puts_unparseable_last(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Ordering,
    ) {
        assert_eq!(compare_versions(a, b), expected);
    }
}
