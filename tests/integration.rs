//! End-to-end coverage: build a small corpus, save it through
//! `MemoryStorage`, and run real filter queries against it.

use glossa::{new_example, query_examples, DictionaryEntry, Example, ExampleFlag, ExampleStorage, Input, MemoryDictionary, MemoryStorage, QueryLimits, Source};

fn dictionary() -> MemoryDictionary {
    MemoryDictionary::new(vec![
        DictionaryEntry { id: "oel".into(), word: "oel".into(), pos: "pn.".into(), ..Default::default() },
        DictionaryEntry { id: "ngati".into(), word: "ngati".into(), pos: "pn.".into(), ..Default::default() },
        DictionaryEntry { id: "kame".into(), word: "kameie".into(), pos: "vtr.".into(), ..Default::default() },
        DictionaryEntry { id: "tute".into(), word: "tute".into(), pos: "n.".into(), ..Default::default() },
    ])
}

fn source(id: &str, date: &str) -> Source {
    Source { id: id.to_string(), date: date.to_string(), url: format!("https://example.test/{id}"), title: String::new(), author: String::new() }
}

fn build(id: &str, text: &str, src: Source, flags: Vec<ExampleFlag>, dictionary: &MemoryDictionary) -> Example {
    let input = Input { id: id.to_string(), text: text.to_string(), source: src, flags, ..Default::default() };
    new_example(&input, dictionary).expect("example should resolve against the test dictionary")
}

#[test]
fn query_by_source_and_flag_returns_newest_first() {
    let dictionary = dictionary();
    let storage = MemoryStorage::new();

    storage.save_example(build("a", "1oel 2ngati 3kameie.", source("NAVITERI2012", "2012-05-01"), vec![], &dictionary)).unwrap();
    storage.save_example(build("b", "1oel 2tute.", source("NAVITERI2012", "2012-06-01"), vec![ExampleFlag::NonCanon], &dictionary)).unwrap();
    storage.save_example(build("c", "1oel 2tute.", source("FORUM2015", "2015-01-01"), vec![], &dictionary)).unwrap();

    let limits = QueryLimits::default();
    let groups = query_examples("src:NAVITERI2012 && oel", &dictionary, &storage, false, &limits).unwrap();

    assert_eq!(groups.len(), 1);
    let ids: Vec<&str> = groups[0].examples.iter().map(|m| m.example.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"], "newer source date should sort first");
}

#[test]
fn flag_negation_excludes_matching_examples() {
    let dictionary = dictionary();
    let storage = MemoryStorage::new();

    storage.save_example(build("a", "1oel 2tute.", source("S1", "2020-01-01"), vec![], &dictionary)).unwrap();
    storage.save_example(build("b", "1oel 2tute.", source("S2", "2021-01-01"), vec![ExampleFlag::Poetry], &dictionary)).unwrap();

    let limits = QueryLimits::default();
    let groups = query_examples("flag:-poetry && tute", &dictionary, &storage, false, &limits).unwrap();
    let ids: Vec<&str> = groups[0].examples.iter().map(|m| m.example.id.as_str()).collect();
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn adjacency_operator_rejects_non_adjacent_matches() {
    let dictionary = dictionary();
    let storage = MemoryStorage::new();

    storage.save_example(build("adjacent", "1oel 2kameie 3ngati.", source("S1", "2020-01-01"), vec![], &dictionary)).unwrap();
    storage.save_example(build("far", "1oel 2tute 3kameie 4tute 5ngati.", source("S1", "2020-01-02"), vec![], &dictionary)).unwrap();

    let limits = QueryLimits::default();
    let groups = query_examples("kameie +> ngati", &dictionary, &storage, false, &limits).unwrap();
    let ids: Vec<&str> = groups[0].examples.iter().map(|m| m.example.id.as_str()).collect();
    assert_eq!(ids, vec!["adjacent"]);
}

#[test]
fn round_trip_through_snapshot_preserves_query_results() {
    let dictionary = dictionary();
    let storage = MemoryStorage::new();
    storage.save_example(build("a", "1oel 2ngati 3kameie.", source("S1", "2020-01-01"), vec![], &dictionary)).unwrap();

    let snapshot = storage.to_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored_snapshot: glossa::storage::Snapshot = serde_json::from_str(&json).unwrap();
    let restored = MemoryStorage::from_snapshot(restored_snapshot);

    let limits = QueryLimits::default();
    let groups = query_examples("kameie", &dictionary, &restored, false, &limits).unwrap();
    assert_eq!(groups[0].examples.len(), 1);
    assert_eq!(groups[0].examples[0].example.id, "a");
}
