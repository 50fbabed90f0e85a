//! gazette Core - Shared types, traits, and storage
//!
//! This crate defines the abstractions shared by the recognizer and the CLI:
//! - Common error types
//! - Row and entity identifiers, attribute maps and query filters
//! - The normalizer contract and its offset maps
//! - The attribute store contract and its SQLite implementation
//! - Progress reporting
//! - Configuration management

pub mod config;
pub mod store;

pub use config::{
    AppConfig, CompileConfig, ConfigError, DictionaryConfig, FieldDefinition, LoggingConfig,
    NormalizerConfig, NormalizerKind, RowPolicy, StoreConfig, StoreMode,
};
pub use store::SqliteAttributeStore;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for gazette operations
#[derive(Error, Debug)]
pub enum GazetteError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error at row {row}: {message}")]
    Parse { row: RowId, message: String },

    #[error("Attribute store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for GazetteError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GazetteError>;

// ============================================================================
// Identifiers
// ============================================================================

/// Zero-based line number of a dictionary row
pub type RowId = usize;

/// Dense identity of one dictionary entity, assigned in first-seen order
pub type InternalId = usize;

/// Attribute values of one row, keyed by attribute name
pub type AttributeMap = BTreeMap<String, Vec<String>>;

// ============================================================================
// Normalization
// ============================================================================

/// Output of a normalizer: the transformed text plus offset maps back to
/// the original.
///
/// Offsets are character indices. `forward` has one entry per normalized
/// character plus a terminal entry equal to the original length; `reverse`
/// has one `(min, max)` entry per original character plus a terminal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    /// Normalized text
    pub text: String,

    /// `forward[normalized_index] = original_index`
    pub forward: Vec<usize>,

    /// `reverse[original_index] = (min_normalized_index, max_normalized_index)`
    pub reverse: Vec<(usize, usize)>,
}

impl Normalized {
    /// Identity normalization of `text`
    pub fn identity(text: &str) -> Self {
        let len = text.chars().count();
        Self {
            text: text.to_string(),
            forward: (0..=len).collect(),
            reverse: (0..=len).map(|i| (i, i)).collect(),
        }
    }

    /// Build from normalized text and its forward map, deriving the reverse map.
    ///
    /// `forward` may hold either `len` or `len + 1` entries; the terminal
    /// entry is always reset to `original_len`. Original characters with no
    /// normalized counterpart map to the next surviving normalized position.
    pub fn from_forward(text: String, mut forward: Vec<usize>, original_len: usize) -> Self {
        let len = text.chars().count();
        forward.truncate(len);
        forward.push(original_len);

        let mut seen: Vec<Option<(usize, usize)>> = vec![None; original_len + 1];
        for (n, &o) in forward.iter().enumerate().take(len) {
            if let Some(slot) = seen.get_mut(o) {
                *slot = Some(match *slot {
                    None => (n, n),
                    Some((lo, hi)) => (lo.min(n), hi.max(n)),
                });
            }
        }
        seen[original_len] = Some((len, len));

        let mut reverse = vec![(len, len); original_len + 1];
        let mut next = (len, len);
        for i in (0..=original_len).rev() {
            match seen[i] {
                Some(range) => {
                    reverse[i] = range;
                    next = (range.0, range.0);
                }
                None => reverse[i] = next,
            }
        }

        Self {
            text,
            forward,
            reverse,
        }
    }

    /// Number of normalized characters
    pub fn len(&self) -> usize {
        self.forward.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of characters in the original text
    pub fn original_len(&self) -> usize {
        self.reverse.len().saturating_sub(1)
    }

    /// Map a half-open normalized span onto the original text
    pub fn to_original(&self, begin: usize, end: usize) -> (usize, usize) {
        let at = |i: usize| {
            self.forward
                .get(i)
                .copied()
                .unwrap_or_else(|| self.original_len())
        };
        let start = at(begin);
        if end > begin {
            (start, at(end - 1) + 1)
        } else {
            (start, start)
        }
    }

    /// Map a half-open original span onto the normalized text
    pub fn to_normalized(&self, begin: usize, end: usize) -> (usize, usize) {
        let at = |i: usize| self.reverse.get(i).map(|r| r.0).unwrap_or_else(|| self.len());
        let start = at(begin);
        (start, at(end).max(start))
    }
}

/// Text transform producing a normalized string with offset maps
pub trait Normalizer: Send + Sync {
    /// Normalize `text`, joining tokens with `word_separator`
    fn normalize(&self, text: &str, word_separator: char, tokenizer_option: u8) -> Normalized;

    /// Short description used in logs
    fn kind(&self) -> &str;
}

// ============================================================================
// Attribute Filters
// ============================================================================

/// Query-time restriction on which rows qualify and which attributes are returned
///
/// `include` and `exclude` are disjunctions of `name == value` constraints.
/// Empty means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    #[serde(default)]
    pub include: BTreeMap<String, BTreeSet<String>>,

    #[serde(default)]
    pub exclude: BTreeMap<String, BTreeSet<String>>,

    /// Attribute names to return (all when empty)
    #[serde(default)]
    pub attrs_out: Vec<String>,
}

impl AttributeFilter {
    /// No restriction at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from an `attrs_where` map keyed by `"+"` (include) and `"-"` (exclude)
    pub fn from_where(
        attrs_where: &BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
        attrs_out: &[String],
    ) -> Result<Self> {
        let mut filter = Self {
            attrs_out: attrs_out.to_vec(),
            ..Self::default()
        };
        for (key, constraints) in attrs_where {
            let target = match key.as_str() {
                "+" => &mut filter.include,
                "-" => &mut filter.exclude,
                other => {
                    return Err(GazetteError::Configuration(format!(
                        "unknown filter key '{other}' (expected '+' or '-')"
                    )))
                }
            };
            for (name, values) in constraints {
                if name.is_empty() {
                    return Err(GazetteError::Configuration(
                        "filter attribute name is empty".to_string(),
                    ));
                }
                target
                    .entry(name.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }
        Ok(filter)
    }

    /// Parse a `name=value` pair as used on the command line
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        match pair.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(GazetteError::Configuration(format!(
                "malformed filter '{pair}' (expected name=value)"
            ))),
        }
    }

    pub fn include(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.include
            .entry(name.into())
            .or_default()
            .insert(value.into());
        self
    }

    pub fn exclude(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.exclude
            .entry(name.into())
            .or_default()
            .insert(value.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.attrs_out.push(name.into());
        self
    }

    /// Whether any include constraint is present
    pub fn has_include(&self) -> bool {
        self.include.values().any(|v| !v.is_empty())
    }

    /// Whether any exclude constraint is present
    pub fn has_exclude(&self) -> bool {
        self.exclude.values().any(|v| !v.is_empty())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Storage for per-row dictionary attributes
pub trait AttributeStore: Send + Sync {
    /// Create tables if missing; safe to call more than once
    fn create_schema(&self) -> Result<()>;

    /// Drop every stored attribute
    fn clear(&self) -> Result<()>;

    /// Start a batch of writes
    fn begin(&self) -> Result<()> {
        Ok(())
    }

    /// Persist one attribute value of a row
    fn store(&self, row: RowId, entity: InternalId, attr_name: &str, attr_value: &str)
        -> Result<()>;

    /// Finish a batch of writes and build lookup indexes
    fn commit(&self) -> Result<()> {
        Ok(())
    }

    /// Discard the writes of an unfinished batch
    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    /// Attributes of the qualifying subset of `rows`
    fn query(
        &self,
        rows: &[RowId],
        filter: &AttributeFilter,
    ) -> Result<BTreeMap<RowId, AttributeMap>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Receiver of advisory progress notifications
pub trait ProgressSink: Send + Sync {
    fn status(&self, _message: &str) {}

    /// Percentage complete, 0 to 100
    fn progress(&self, _percent: u8) {}
}

/// Sink that discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

// ============================================================================
// Tests
// ============================================================================
