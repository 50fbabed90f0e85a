//! Trie shards and the builder that fills them
//!
//! A shard holds one trie per normalizer layer. The builder starts a new
//! shard whenever the current one reaches `item_limit` rows, and compresses
//! finished shards when configured to.

use std::collections::BTreeMap;
use std::sync::Arc;

use gazette_core::{AttributeStore, InternalId, Result, RowId};
use tracing::debug;

use crate::dictionary::DictionarySpec;
use crate::trie::Trie;

/// Settings shared by every shard of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardOptions {
    pub compressed: bool,
    /// Rows per shard (0 = unbounded)
    pub item_limit: usize,
    pub tokenizer_option: u8,
    pub word_separator: char,
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self {
            compressed: true,
            item_limit: 0,
            tokenizer_option: 0,
            word_separator: ' ',
        }
    }
}

/// Size-bounded chunk of the dictionary
#[derive(Debug, Clone)]
pub struct TrieShard {
    layers: BTreeMap<String, Trie>,
    rows: usize,
    compressed: bool,
    tokenizer_option: u8,
    word_separator: char,
}

impl TrieShard {
    fn new(layers: &[String], options: &ShardOptions) -> Self {
        Self {
            layers: layers.iter().map(|l| (l.clone(), Trie::new())).collect(),
            rows: 0,
            compressed: false,
            tokenizer_option: options.tokenizer_option,
            word_separator: options.word_separator,
        }
    }

    /// Trie for one normalizer layer
    pub fn layer(&self, name: &str) -> Option<&Trie> {
        self.layers.get(name)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, &Trie)> {
        self.layers.iter().map(|(name, trie)| (name.as_str(), trie))
    }

    /// Rows inserted into this shard
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Tokenizer option the labels were normalized with
    pub fn tokenizer_option(&self) -> u8 {
        self.tokenizer_option
    }

    /// Separator between the words of every label
    pub fn word_separator(&self) -> char {
        self.word_separator
    }

    fn seal(mut self, compress: bool) -> Self {
        if compress {
            for trie in self.layers.values_mut() {
                *trie = trie.compress();
            }
            self.compressed = true;
        }
        self
    }
}

/// One parsed dictionary line
#[derive(Debug, Clone, Copy)]
pub struct DictionaryRow<'a> {
    pub row: RowId,
    pub entity: InternalId,
    pub columns: &'a [String],
}

/// Write every attribute column of `row` to `store`.
///
/// The value column is skipped. Delimited columns are split, empty pieces
/// dropped and repeats stored once.
pub fn store_attributes(
    store: &dyn AttributeStore,
    spec: &DictionarySpec,
    row: &DictionaryRow<'_>,
) -> Result<()> {
    for (name, field) in spec.attribute_fields() {
        let Some(raw) = row.columns.get(field.column_index) else {
            continue;
        };
        match &field.delimiter {
            None => store.store(row.row, row.entity, name, raw)?,
            Some(delimiter) => {
                let mut seen: Vec<&str> = Vec::new();
                for part in raw.split(delimiter.as_str()) {
                    if part.is_empty() || seen.contains(&part) {
                        continue;
                    }
                    seen.push(part);
                    store.store(row.row, row.entity, name, part)?;
                }
            }
        }
    }
    Ok(())
}

/// Fills trie shards row by row
pub struct TrieBuilder {
    spec: Arc<DictionarySpec>,
    layer_names: Vec<String>,
    options: ShardOptions,
    current: TrieShard,
    finished: Vec<TrieShard>,
}

impl TrieBuilder {
    pub fn new(spec: Arc<DictionarySpec>, layer_names: &[String], options: ShardOptions) -> Self {
        let current = TrieShard::new(layer_names, &options);
        Self {
            spec,
            layer_names: layer_names.to_vec(),
            options,
            current,
            finished: Vec::new(),
        }
    }

    /// Insert `label` for `row` into `layer` and store the row's attributes.
    ///
    /// Starts a new shard first when the current one is full, so a shard is
    /// never opened without a row to put in it.
    pub fn insert(
        &mut self,
        store: &dyn AttributeStore,
        layer: &str,
        label: &str,
        row: &DictionaryRow<'_>,
    ) -> Result<()> {
        if self.options.item_limit > 0 && self.current.rows >= self.options.item_limit {
            self.rotate();
        }
        if !self.layer_names.iter().any(|l| l == layer) {
            self.layer_names.push(layer.to_string());
        }

        self.current
            .layers
            .entry(layer.to_string())
            .or_default()
            .insert(label, row.row)?;
        store_attributes(store, &self.spec, row)?;
        self.current.rows += 1;
        Ok(())
    }

    /// Remove `label` from `layer` of the shard being filled
    pub fn remove(&mut self, layer: &str, label: &str) -> Result<bool> {
        match self.current.layers.get_mut(layer) {
            Some(trie) => trie.remove(label),
            None => Ok(false),
        }
    }

    fn rotate(&mut self) {
        let next = TrieShard::new(&self.layer_names, &self.options);
        let full = std::mem::replace(&mut self.current, next);
        debug!(
            "Shard {} finished with {} rows",
            self.finished.len(),
            full.rows
        );
        self.finished.push(full.seal(self.options.compressed));
    }

    /// Seal the last shard and return all shards; an empty last shard is dropped
    pub fn finish(mut self) -> Vec<TrieShard> {
        if self.current.rows > 0 {
            self.rotate();
        }
        self.finished
    }
}
