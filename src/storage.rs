//! `ExampleStorage`: the persistence seam the query driver and save path
//! consume (spec §6), plus an in-memory reference implementation used by
//! this crate's own tests (spec §4.7).

use crate::base::{HashMap, HashSet};
use crate::dictionary::{Dictionary, DictionaryEntry};
use crate::error::StorageError;
use crate::example::{Example, Input, Source};
use crate::filter::Filter;
use std::sync::RwLock;
use tracing::warn;

pub trait ExampleStorage {
    fn find_example(&self, id: &str) -> Result<Example, StorageError>;
    fn list_examples(&self) -> Result<Vec<Example>, StorageError>;
    fn list_examples_for_entry(&self, entry_id: &str) -> Result<Vec<Example>, StorageError>;
    fn list_examples_by_source(&self, source_id: &str) -> Result<Vec<Example>, StorageError>;
    fn save_example(&self, example: Example) -> Result<(), StorageError>;
    fn delete_example(&self, example: &Example) -> Result<(), StorageError>;

    /// Picks a small superset of examples worth running the matcher over:
    /// the `src:<id>` posting list when a source is pinned, the full list
    /// when no term can narrow the search, or else the shortest posting
    /// list per OR-separated term group, unioned across groups.
    fn fetch_examples(&self, filter: &Filter, resolved: &HashMap<usize, DictionaryEntry>) -> Result<Vec<Example>, StorageError> {
        if let Some(source_id) = &filter.source_id {
            return self.list_examples_by_source(source_id);
        }
        if filter.needs_full_list() {
            return self.list_examples();
        }

        let mut seen: HashSet<String> = HashSet::default();
        let mut result = Vec::new();
        for group in filter.word_lookup_strategy(resolved) {
            let mut shortest: Option<Vec<Example>> = None;
            for entry in &group {
                let list = self.list_examples_for_entry(&entry.id)?;
                if shortest.as_ref().is_none_or(|s| list.len() < s.len()) {
                    shortest = Some(list);
                }
            }
            for example in shortest.into_iter().flatten() {
                if seen.insert(example.id.clone()) {
                    result.push(example);
                }
            }
        }
        Ok(result)
    }
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub examples: HashMap<String, Example>,
    pub index: HashMap<String, Vec<String>>,
    pub dict_defs: HashMap<String, HashMap<String, String>>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceFile {
    pub source: Source,
    pub inputs: Vec<Input>,
}

impl SourceFile {
    /// Encodes to the `{source, inputs}` YAML shape used for one file per
    /// source on disk.
    pub fn to_yaml(&self) -> Result<String, StorageError> {
        serde_yaml::to_string(self).map_err(|e| StorageError::Format(e.to_string()))
    }

    pub fn from_yaml(text: &str) -> Result<Self, StorageError> {
        serde_yaml::from_str(text).map_err(|e| StorageError::Format(e.to_string()))
    }
}

#[derive(Default)]
struct Inner {
    examples: HashMap<String, Example>,
    index: HashMap<String, Vec<String>>,
}

/// A mutex-guarded in-memory example store with an inverted index keyed
/// by dictionary-entry id and `src:<source-id>`.
pub struct MemoryStorage {
    read_only: bool,
    inner: RwLock<Inner>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        MemoryStorage { read_only: false, inner: RwLock::new(Inner::default()) }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(examples: Vec<Example>) -> Self {
        let mut storage = MemoryStorage::default();
        {
            let mut inner = storage.inner.write().unwrap();
            for example in examples {
                index_example(&mut inner.index, &example);
                inner.examples.insert(example.id.clone(), example);
            }
        }
        storage.read_only = true;
        storage
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut examples = snapshot.examples;
        for example in examples.values_mut() {
            for words in example.words.values_mut() {
                for word in words.iter_mut() {
                    if let Some(defs) = snapshot.dict_defs.get(&word.id) {
                        word.definitions = defs.clone();
                    }
                }
            }
        }

        MemoryStorage { read_only: false, inner: RwLock::new(Inner { examples, index: snapshot.index }) }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let inner = self.inner.read().unwrap();
        let mut dict_defs: HashMap<String, HashMap<String, String>> = HashMap::default();
        let mut examples = inner.examples.clone();

        for example in examples.values_mut() {
            for words in example.words.values_mut() {
                for word in words.iter_mut() {
                    if word.id.is_empty() {
                        continue;
                    }
                    dict_defs.insert(word.id.clone(), std::mem::take(&mut word.definitions));
                }
            }
        }

        Snapshot { examples, index: inner.index.clone(), dict_defs }
    }

    /// One `SourceFile` per distinct source, each holding the minimal
    /// `Input`s needed to reconstruct its examples.
    pub fn to_source_files(&self, dictionary: Option<&dyn Dictionary>) -> Vec<SourceFile> {
        let inner = self.inner.read().unwrap();
        let mut by_source: HashMap<String, SourceFile> = HashMap::default();

        for example in inner.examples.values() {
            let file = by_source.entry(example.source.id.clone()).or_insert_with(|| SourceFile { source: example.source.clone(), inputs: Vec::new() });
            let mut input = example.minimal_input(dictionary);
            input.source = Source::default();
            file.inputs.push(input);
        }

        by_source.into_values().collect()
    }

    pub fn from_source_files(files: Vec<SourceFile>, dictionary: &dyn Dictionary) -> Result<Self, crate::error::ExampleError> {
        let storage = MemoryStorage::default();
        let mut inner = storage.inner.write().unwrap();

        for file in files {
            for mut input in file.inputs {
                input.source = file.source.clone();
                let example = crate::example::new_example(&input, dictionary)?;
                index_example(&mut inner.index, &example);
                inner.examples.insert(example.id.clone(), example);
            }
        }

        drop(inner);
        Ok(storage)
    }
}

fn index_example(index: &mut HashMap<String, Vec<String>>, example: &Example) {
    let mut seen: HashSet<&str> = HashSet::default();
    for words in example.words.values() {
        for word in words {
            if seen.insert(&word.id) {
                index.entry(word.id.clone()).or_default().push(example.id.clone());
            }
        }
    }
    index.entry(format!("src:{}", example.source.id)).or_default().push(example.id.clone());
}

fn unindex_example(index: &mut HashMap<String, Vec<String>>, example: &Example) {
    for words in example.words.values() {
        for word in words {
            if let Some(list) = index.get_mut(&word.id) {
                list.retain(|id| id != &example.id);
            }
        }
    }
    if let Some(list) = index.get_mut(&format!("src:{}", example.source.id)) {
        list.retain(|id| id != &example.id);
    }
}

impl ExampleStorage for MemoryStorage {
    fn find_example(&self, id: &str) -> Result<Example, StorageError> {
        let inner = self.inner.read().unwrap();
        inner.examples.get(id).cloned().ok_or(StorageError::ExampleNotFound)
    }

    fn list_examples(&self) -> Result<Vec<Example>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.examples.values().cloned().collect())
    }

    fn list_examples_for_entry(&self, entry_id: &str) -> Result<Vec<Example>, StorageError> {
        let inner = self.inner.read().unwrap();
        let ids = inner.index.get(entry_id);
        Ok(ids
            .into_iter()
            .flatten()
            .filter_map(|id| match inner.examples.get(id) {
                Some(example) => Some(example.clone()),
                None => {
                    warn!(entry_id, example_id = id.as_str(), "index references an example that no longer exists");
                    None
                }
            })
            .collect())
    }

    fn list_examples_by_source(&self, source_id: &str) -> Result<Vec<Example>, StorageError> {
        self.list_examples_for_entry(&format!("src:{source_id}"))
    }

    fn save_example(&self, example: Example) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        let mut inner = self.inner.write().unwrap();
        if let Some(previous) = inner.examples.get(&example.id).cloned() {
            unindex_example(&mut inner.index, &previous);
        }
        index_example(&mut inner.index, &example);
        inner.examples.insert(example.id.clone(), example);
        Ok(())
    }

    fn delete_example(&self, example: &Example) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        let mut inner = self.inner.write().unwrap();
        if inner.examples.remove(&example.id).is_none() {
            return Err(StorageError::ExampleNotFound);
        }
        unindex_example(&mut inner.index, example);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryDictionary;
    use crate::example::new_example;

    fn dict() -> MemoryDictionary {
        MemoryDictionary::new(vec![DictionaryEntry { id: "oel".into(), word: "oel".into(), pos: "pn.".into(), ..Default::default() }])
    }

    fn example(id: &str, source: &str) -> Example {
        let input = Input { id: id.to_string(), text: "1oel.".to_string(), source: Source { id: source.to_string(), date: "2024-01-01".into(), url: "u".into(), ..Default::default() }, ..Default::default() };
        new_example(&input, &dict()).unwrap()
    }

    #[test]
    fn index_integrity_after_save_and_delete() {
        let storage = MemoryStorage::new();
        let ex = example("e1", "s1");
        storage.save_example(ex.clone()).unwrap();

        assert_eq!(storage.list_examples_for_entry("oel").unwrap().len(), 1);
        assert_eq!(storage.list_examples_by_source("s1").unwrap().len(), 1);

        storage.delete_example(&ex).unwrap();
        assert!(storage.list_examples_for_entry("oel").unwrap().is_empty());
        assert!(storage.find_example("e1").is_err());
    }

    #[test]
    fn read_only_rejects_writes() {
        let storage = MemoryStorage::read_only(vec![example("e1", "s1")]);
        assert!(matches!(storage.save_example(example("e2", "s1")), Err(StorageError::ReadOnly)));
        assert_eq!(storage.list_examples().unwrap().len(), 1);
    }

    #[test]
    fn source_file_yaml_round_trips() {
        let storage = MemoryStorage::new();
        storage.save_example(example("e1", "s1")).unwrap();

        let files = storage.to_source_files(None);
        assert_eq!(files.len(), 1);
        let yaml = files[0].to_yaml().unwrap();
        let restored = SourceFile::from_yaml(&yaml).unwrap();

        assert_eq!(restored.source.id, "s1");
        assert_eq!(restored.inputs.len(), 1);
        assert_eq!(restored.inputs[0].id, "e1");
        assert_eq!(restored.inputs[0].source, Source::default(), "per-input source is cleared since the file's own source covers it");
    }

    #[test]
    fn snapshot_round_trips() {
        let storage = MemoryStorage::new();
        storage.save_example(example("e1", "s1")).unwrap();
        let snapshot = storage.to_snapshot();
        let restored = MemoryStorage::from_snapshot(snapshot);
        assert_eq!(restored.list_examples().unwrap().len(), 1);
    }
}
