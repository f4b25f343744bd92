use crate::dictionary::DictionaryEntry;
use thiserror::Error;

/// Raised while building an `Example` from an `Input` (see `example::new_example`).
///
/// `part` names the section of the input the problem came from, matching
/// the closed set spec'd for the original: `flags`, `translations`,
/// `text.wordMap`, `annotations`.
#[derive(Debug, Error)]
#[error("{part}.{key}: {message}{}", format_words(.words))]
pub struct ExampleError {
    pub part: &'static str,
    pub key: String,
    pub message: String,
    pub link: Option<u32>,
    pub words: Vec<DictionaryEntry>,
}

fn format_words(words: &[DictionaryEntry]) -> String {
    if words.is_empty() {
        return String::new();
    }

    let mut out = String::from(": ");
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{} ({}:{})", word.word, word.id, word.pos));
    }
    out
}

/// The closed set of `FilterParseError` codes from the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorCode {
    EmptyQueryTerm,
    TooManyTerms,
    TooManyConstraints,
    FlagNotUnderstood,
    NoMatchedEntries,
    TextFilterConstraints,
}

impl std::fmt::Display for FilterErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterErrorCode::EmptyQueryTerm => "empty_query_term",
            FilterErrorCode::TooManyTerms => "too_many_terms",
            FilterErrorCode::TooManyConstraints => "too_many_constraints",
            FilterErrorCode::FlagNotUnderstood => "flag_not_understood",
            FilterErrorCode::NoMatchedEntries => "no_matched_entries",
            FilterErrorCode::TextFilterConstraints => "text_filter_constraints",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("error on term {term} in filter: {message} ({code})")]
pub struct FilterParseError {
    pub term: usize,
    pub code: FilterErrorCode,
    pub message: String,
}

/// Sentinels from spec.md §7, plus the two resource-cap errors from §4.6.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterParseError),
    #[error("more than {limit} resolved combinations")]
    TooManyCombinations { limit: usize },
    #[error("more than {limit} aggregate results")]
    TooManyResults { limit: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary entry not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("example not found")]
    ExampleNotFound,
    #[error("modifications are not allowed")]
    ReadOnly,
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Example(#[from] ExampleError),
    #[error("{0}")]
    Format(String),
}
