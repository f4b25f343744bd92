//! The query driver: parses a filter, resolves it against a dictionary,
//! fetches narrowed candidates from storage, and runs the matcher across
//! them on a small worker pool (spec §4.6).

use crate::dictionary::{Dictionary, DictionaryEntry};
use crate::error::QueryError;
use crate::filter::{parse_filter, resolve, Filter};
use crate::matcher::{check_example, FilterMatch};
use crate::storage::ExampleStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, trace};

/// Resource caps absent from the original service: an unbounded word
/// could otherwise resolve into thousands of dictionary-entry
/// combinations, or a wildcard term into a full-corpus scan per group.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub max_combinations: usize,
    pub max_results: usize,
    pub workers: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits { max_combinations: 10, max_results: 2000, workers: 3 }
    }
}

/// One resolved term-combination's matches, newest-first.
#[derive(Debug, Clone)]
pub struct ExampleGroup {
    pub entries: Vec<DictionaryEntry>,
    pub examples: Vec<FilterMatch>,
}

pub fn query_examples(
    query: &str,
    dictionary: &dyn Dictionary,
    storage: &dyn ExampleStorage,
    allow_reef: bool,
    limits: &QueryLimits,
) -> Result<Vec<ExampleGroup>, QueryError> {
    let filter = parse_filter(query)?;
    let combinations = resolve(&filter, dictionary, allow_reef)?;
    debug!(terms = filter.terms.len(), combinations = combinations.len(), "resolved filter");

    if combinations.len() > limits.max_combinations {
        return Err(QueryError::TooManyCombinations { limit: limits.max_combinations });
    }

    let mut groups = Vec::with_capacity(combinations.len());
    let mut total = 0usize;

    for resolved in combinations {
        let candidates = storage.fetch_examples(&filter, &resolved)?;
        trace!(candidates = candidates.len(), "fetched candidates for combination");

        let mut matches = run_matcher(&filter, &candidates, &resolved, limits.workers.max(1));
        if matches.is_empty() {
            continue;
        }
        matches.sort_by(|a, b| if a.example.list_before(&b.example) { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater });

        total += matches.len();
        if total > limits.max_results {
            return Err(QueryError::TooManyResults { limit: limits.max_results });
        }

        let entries = entries_for(&filter, &resolved);
        groups.push(ExampleGroup { entries, examples: matches });
    }

    Ok(groups)
}

fn entries_for(filter: &Filter, resolved: &crate::base::HashMap<usize, DictionaryEntry>) -> Vec<DictionaryEntry> {
    (0..filter.terms.len()).filter_map(|i| resolved.get(&i).cloned()).collect()
}

/// Splits `candidates` across `workers` threads pulling indices off a
/// shared counter, mirroring the original service's goroutine pool.
fn run_matcher(
    filter: &Filter,
    candidates: &[crate::example::Example],
    resolved: &crate::base::HashMap<usize, DictionaryEntry>,
    workers: usize,
) -> Vec<FilterMatch> {
    let next = AtomicUsize::new(0);
    let results = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(example) = candidates.get(i) else { break };
                if let Some(m) = check_example(filter, example, resolved) {
                    results.lock().unwrap().push(m);
                }
            });
        }
    });

    results.into_inner().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryDictionary;
    use crate::example::{new_example, Input, Source};
    use crate::storage::MemoryStorage;

    fn dict() -> MemoryDictionary {
        MemoryDictionary::new(vec![
            DictionaryEntry { id: "ikran".into(), word: "ikran".into(), pos: "n.".into(), ..Default::default() },
            DictionaryEntry { id: "tsyal".into(), word: "tsyal".into(), pos: "n.".into(), ..Default::default() },
        ])
    }

    fn seeded_storage(dictionary: &dyn Dictionary) -> MemoryStorage {
        let storage = MemoryStorage::new();
        let texts = [("e1", "s1", "2024-03-01", "1ikran."), ("e2", "s2", "2024-01-01", "1ikran 2tsyal."), ("e3", "s1", "2024-02-01", "1tsyal.")];
        for (id, source, date, text) in texts {
            let input = Input { id: id.to_string(), text: text.to_string(), source: Source { id: source.to_string(), date: date.to_string(), url: "u".into(), ..Default::default() }, ..Default::default() };
            storage.save_example(new_example(&input, dictionary).unwrap()).unwrap();
        }
        storage
    }

    #[test]
    fn query_returns_matches_sorted_newest_first() {
        let dictionary = dict();
        let storage = seeded_storage(&dictionary);
        let limits = QueryLimits::default();

        let groups = query_examples("ikran", &dictionary, &storage, false, &limits).unwrap();
        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].examples.iter().map(|m| m.example.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn source_filter_narrows_to_one_source() {
        let dictionary = dict();
        let storage = seeded_storage(&dictionary);
        let limits = QueryLimits::default();

        let groups = query_examples("src:s1 && ikran", &dictionary, &storage, false, &limits).unwrap();
        assert_eq!(groups[0].examples.len(), 1);
        assert_eq!(groups[0].examples[0].example.id, "e1");
    }

    #[test]
    fn combinations_with_no_matches_are_dropped() {
        let dictionary = MemoryDictionary::new(vec![
            DictionaryEntry { id: "tute.1".into(), word: "tute".into(), pos: "n.".into(), ..Default::default() },
            DictionaryEntry { id: "tute.2".into(), word: "tute".into(), pos: "vin.".into(), ..Default::default() },
        ]);
        let storage = MemoryStorage::new();
        let input = Input {
            id: "e1".to_string(),
            text: "1tute.".to_string(),
            source: Source { id: "s1".to_string(), date: "2024-01-01".to_string(), url: "u".into(), ..Default::default() },
            lookup_filter: [(1u32, "n.".to_string())].into_iter().collect(),
            ..Default::default()
        };
        storage.save_example(new_example(&input, &dictionary).unwrap()).unwrap();

        let limits = QueryLimits::default();
        let groups = query_examples("tute", &dictionary, &storage, false, &limits).unwrap();

        assert_eq!(groups.len(), 1, "the sense with zero matches should not produce an empty group");
        assert_eq!(groups[0].entries[0].id, "tute.1");
        assert_eq!(groups[0].examples[0].example.id, "e1");
    }

    #[test]
    fn too_many_results_is_reported() {
        let dictionary = dict();
        let storage = seeded_storage(&dictionary);
        let limits = QueryLimits { max_results: 1, ..QueryLimits::default() };

        let err = query_examples("ikran", &dictionary, &storage, false, &limits).unwrap_err();
        assert!(matches!(err, QueryError::TooManyResults { limit: 1 }));
    }
}
