pub mod base;
pub mod dictionary;
pub mod error;
pub mod example;
pub mod filter;
pub mod index;
pub mod matcher;
pub mod sentence;
pub mod storage;

pub use dictionary::{CombinedDictionary, Dictionary, DictionaryEntry, MemoryDictionary, MultiWordFilter, WithDerivedPoS, WordFilter};
pub use error::{DictionaryError, ExampleError, FilterParseError, QueryError, StorageError};
pub use example::{new_example, Example, ExampleFlag, Input, Source};
pub use filter::{parse_filter, Filter, FilterTerm, Operator};
pub use index::{query_examples, ExampleGroup, QueryLimits};
pub use matcher::{check_example, FilterMatch};
pub use sentence::Sentence;
pub use storage::{ExampleStorage, MemoryStorage};
