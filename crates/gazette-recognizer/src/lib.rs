//! gazette Recognizer - Dictionary-based entity recognition
//!
//! Compiles a tagged synonym dictionary into sharded, radix-compressed
//! tries and scans text for longest exact matches. Matches found under
//! several normalizers are aligned on the original text, homonyms are
//! disambiguated from surrounding words and overlapping spans are reduced
//! to a non-overlapping result.

use std::collections::{BTreeMap, BTreeSet};

use gazette_core::Result;
use serde::Serialize;

pub mod align;
pub mod dictionary;
pub mod disambiguate;
pub mod keywords;
pub mod model;
pub mod normalize;
pub mod reduce;
pub mod shard;
pub mod spotter;
pub mod trie;

pub use dictionary::{DictionarySpec, FieldSpec};
pub use model::{CompileOptions, CompileReport, Model};
pub use normalize::{BypassNormalizer, TokenNormalizer};
pub use reduce::SpanAttributes;

/// Entity recognized in text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognizedEntity {
    /// Original text of the span
    pub text: String,
    pub begin: usize,
    pub end: usize,
    pub attributes: BTreeMap<String, BTreeSet<String>>,
}

/// Trait for entity extractors
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<RecognizedEntity>>;
}
