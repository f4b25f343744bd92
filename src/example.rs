//! The annotated example record: source metadata, flags, links into the
//! sentence, and the dictionary entries resolved for each word id.

use crate::base::HashMap;
use crate::dictionary::{Dictionary, DictionaryEntry, MultiWordFilter};
use crate::error::ExampleError;
use crate::sentence::{self, Sentence};

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleFlag {
    Poetry,
    NonCanon,
    UserTranslation,
    ReefDialect,
    Proverb,
    Slang,
    Formal,
    Syntax,
    Clipped,
    Transcribed,
}

impl ExampleFlag {
    pub const ALL: [ExampleFlag; 10] = [
        ExampleFlag::Poetry,
        ExampleFlag::NonCanon,
        ExampleFlag::UserTranslation,
        ExampleFlag::ReefDialect,
        ExampleFlag::Proverb,
        ExampleFlag::Slang,
        ExampleFlag::Formal,
        ExampleFlag::Syntax,
        ExampleFlag::Clipped,
        ExampleFlag::Transcribed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExampleFlag::Poetry => "poetry",
            ExampleFlag::NonCanon => "non_canon",
            ExampleFlag::UserTranslation => "user_translation",
            ExampleFlag::ReefDialect => "reef_dialect",
            ExampleFlag::Proverb => "proverb",
            ExampleFlag::Slang => "slang",
            ExampleFlag::Formal => "formal",
            ExampleFlag::Syntax => "syntax",
            ExampleFlag::Clipped => "clipped",
            ExampleFlag::Transcribed => "transcribed",
        }
    }
}

impl std::str::FromStr for ExampleFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        ExampleFlag::ALL.into_iter().find(|f| f.as_str() == s).ok_or(())
    }
}

impl std::fmt::Display for ExampleFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    VerbParameters,
    SplitSiVerb,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub kind: Option<AnnotationKind>,
    #[serde(default)]
    pub links: HashMap<String, Vec<u32>>,
}

const VERB_PARAMETER_KEYS: &[&str] = &["subject", "predicate", "agent", "patient", "adverb", "adverbial", "dative"];

impl Annotation {
    /// A `verb_parameters` annotation needs a `verb` link plus exactly one
    /// of the recognised role keys; a `split_si_verb` needs one `si` link
    /// and at least one `noun` link.
    pub fn validate(&self) -> bool {
        match self.kind {
            Some(AnnotationKind::VerbParameters) => {
                if self.links.get("verb").is_none_or(Vec::is_empty) {
                    return false;
                }
                let count = VERB_PARAMETER_KEYS.iter().filter(|key| self.links.contains_key(**key)).count();
                count > 0 && count + 1 == self.links.len()
            }
            Some(AnnotationKind::SplitSiVerb) => {
                self.links.get("si").map_or(0, Vec::len) == 1 && self.links.get("noun").map_or(0, Vec::len) >= 1
            }
            None => false,
        }
    }
}

/// The user-facing record used to create or update an `Example`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub lookup_filter: HashMap<u32, String>,
    #[serde(default)]
    pub translations: HashMap<String, String>,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ExampleFlag>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Example {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub text: Sentence,
    #[serde(default)]
    pub translations: HashMap<String, Sentence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    pub source: Source,
    #[serde(default)]
    pub words: HashMap<u32, Vec<DictionaryEntry>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ExampleFlag>,
}

/// Parses, validates and resolves an `Input` against a dictionary,
/// producing an immutable `Example`. Mirrors the original's `NewExample`.
pub fn new_example(input: &Input, dictionary: &dyn Dictionary) -> Result<Example, ExampleError> {
    let allow_reef = input.flags.contains(&ExampleFlag::ReefDialect);

    let mut example = Example {
        id: input.id.clone(),
        text: sentence::parse(input.text.trim()),
        translations: HashMap::default(),
        annotations: Vec::new(),
        source: input.source.clone(),
        words: HashMap::default(),
        flags: input.flags.clone(),
    };

    for (lang, translation) in &input.translations {
        let translation = translation.trim();
        if translation.is_empty() {
            continue;
        }

        let parsed = sentence::parse(translation);
        for part in parsed.iter() {
            for &id in &part.ids {
                if !example.text.has_part_id(id) {
                    return Err(ExampleError {
                        part: "translations",
                        key: lang.clone(),
                        message: format!("ID {id} not found in Na'vi text"),
                        link: Some(id),
                        words: Vec::new(),
                    });
                }
            }
        }

        example.translations.insert(lang.clone(), parsed);
    }

    for (id, word) in example.text.word_map() {
        let matches = dictionary.lookup(&word, allow_reef).unwrap_or_default();
        let filter = MultiWordFilter::parse(input.lookup_filter.get(&id).map(String::as_str).unwrap_or(""));

        let filtered: Vec<DictionaryEntry> = matches.into_iter().filter(|entry| filter.check(entry, true)).collect();

        if filtered.is_empty() {
            return Err(ExampleError {
                part: "text.wordMap",
                key: id.to_string(),
                message: format!("Word \"{word}\" has no matches"),
                link: None,
                words: Vec::new(),
            });
        }

        example.words.insert(id, filtered);
    }

    for (i, annotation) in input.annotations.iter().enumerate() {
        if !annotation.validate() {
            return Err(ExampleError {
                part: "annotations",
                key: i.to_string(),
                message: format!("Annotation of type {:?} could not be validated.", annotation.kind),
                link: None,
                words: Vec::new(),
            });
        }

        for links in annotation.links.values() {
            for &link in links {
                if !example.text.has_part_id(link) {
                    return Err(ExampleError {
                        part: "annotations",
                        key: i.to_string(),
                        message: "Linked ID not found in Na'vi text.".to_string(),
                        link: Some(link),
                        words: Vec::new(),
                    });
                }
            }
        }

        example.annotations.push(annotation.clone());
    }

    Ok(example)
}

impl Example {
    /// Orders examples newest source date first, then source id, then the
    /// Na'vi text alphabetically — used to present results deterministically.
    pub fn list_before(&self, other: &Example) -> bool {
        if self.source.date == other.source.date {
            if self.source.id == other.source.id {
                let self_head = self.text.first().map(|p| p.text.as_str()).unwrap_or("");
                let other_head = other.text.first().map(|p| p.text.as_str()).unwrap_or("");
                if self_head == other_head {
                    return self.text.raw_text() < other.text.raw_text();
                }
                return self_head < other_head;
            }
            return self.id < other.id;
        }
        self.source.date > other.source.date
    }

    pub fn has_flag(&self, flag: ExampleFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn has_word(&self, id: &str) -> bool {
        self.words.values().any(|entries| entries.iter().any(|e| e.id == id))
    }

    /// The minimal `Input` that would reproduce this example, omitting
    /// lookup filters for ids whose dictionary lookup is unambiguous.
    pub fn minimal_input(&self, dictionary: Option<&dyn Dictionary>) -> Input {
        let allow_reef = self.flags.contains(&ExampleFlag::ReefDialect);
        let word_map = self.text.word_map();

        let mut lookup_filter = HashMap::default();
        for (&id, words) in &self.words {
            let dict_words = dictionary.and_then(|d| d.lookup(word_map.get(&id).map(String::as_str).unwrap_or(""), allow_reef).ok());

            let needs_filter = match &dict_words {
                Some(found) => found.len() != words.len(),
                None => dictionary.is_none(),
            };

            if needs_filter {
                let filter = MultiWordFilter(words.iter().map(DictionaryEntry::to_filter).collect());
                lookup_filter.insert(id, filter.to_string());
            }
        }

        Input {
            id: self.id.clone(),
            text: self.text.to_string(),
            lookup_filter,
            translations: self.translations.iter().map(|(k, v)| (k.clone(), v.to_string())).collect(),
            source: self.source.clone(),
            annotations: self.annotations.clone(),
            flags: self.flags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryDictionary;

    fn dict() -> MemoryDictionary {
        MemoryDictionary::new(vec![
            DictionaryEntry { id: "oel".into(), word: "oel".into(), pos: "pn.".into(), ..Default::default() },
            DictionaryEntry { id: "ngati".into(), word: "ngati".into(), pos: "pn.".into(), ..Default::default() },
            DictionaryEntry { id: "kame".into(), word: "kameie".into(), pos: "vtr.".into(), ..Default::default() },
        ])
    }

    fn input(text: &str) -> Input {
        Input { text: text.to_string(), source: Source { id: "s".into(), date: "2024-01-01".into(), url: "u".into(), ..Default::default() }, ..Default::default() }
    }

    #[test]
    fn builds_example_and_resolves_words() {
        let example = new_example(&input("1oel 2ngati 3kameie."), &dict()).unwrap();
        assert_eq!(example.words.len(), 3);
        assert_eq!(example.words[&1][0].id, "oel");
    }

    #[test]
    fn rejects_unresolvable_word() {
        let example = new_example(&input("1oel 9tawtute."), &dict());
        assert!(example.is_err());
    }

    #[test]
    fn rejects_translation_id_not_in_text() {
        let mut i = input("1oel.");
        i.translations.insert("en".to_string(), "2I.".to_string());
        assert!(new_example(&i, &dict()).is_err());
    }

    #[test]
    fn list_before_orders_by_date_then_text() {
        let a = new_example(&input("1oel."), &dict()).unwrap();
        let mut b_input = input("1oel.");
        b_input.source.date = "2023-01-01".to_string();
        let b = new_example(&b_input, &dict()).unwrap();
        assert!(a.list_before(&b));
    }
}
