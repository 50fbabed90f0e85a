//! Layer aligner
//!
//! Every normalizer produces its own text and its own matches. Matches are
//! mapped back onto the original text through the forward map and grouped
//! by original `(begin, end)`; matches landing on the same location merge.

use std::collections::{BTreeMap, BTreeSet};

use gazette_core::{AttributeMap, Normalized, RowId};
use serde::Serialize;

use crate::spotter::Match;

/// Scan result of one normalizer across all shards
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub normalized: Normalized,
    /// Matches paired with the shard that produced them
    pub matches: Vec<(usize, Match)>,
}

/// Contribution of one layer match to an aligned span
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanOrigin {
    pub layer: usize,
    pub shard: usize,
    pub candidate_ids: BTreeSet<RowId>,
    /// Span in the layer's normalized text
    pub begin: usize,
    pub end: usize,
}

/// Match location in the original text with everything found there
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignedSpan {
    pub begin: usize,
    pub end: usize,
    pub candidate_ids: BTreeSet<RowId>,
    pub attrs_by_id: BTreeMap<RowId, AttributeMap>,
    pub origins: Vec<SpanOrigin>,
}

impl AlignedSpan {
    fn empty(begin: usize, end: usize) -> Self {
        Self {
            begin,
            end,
            candidate_ids: BTreeSet::new(),
            attrs_by_id: BTreeMap::new(),
            origins: Vec::new(),
        }
    }

    /// Layers that contributed `row`
    pub fn layers_of(&self, row: RowId) -> impl Iterator<Item = usize> + '_ {
        self.origins
            .iter()
            .filter(move |o| o.candidate_ids.contains(&row))
            .map(|o| o.layer)
    }

    /// Drop `row` from the span and its origins
    pub fn discard(&mut self, row: RowId) {
        self.candidate_ids.remove(&row);
        self.attrs_by_id.remove(&row);
        for origin in &mut self.origins {
            origin.candidate_ids.remove(&row);
        }
    }
}

/// Merge all layer matches by original location, ordered by `(begin, end)`
pub fn align_layers(layers: &[Layer]) -> Vec<AlignedSpan> {
    let mut grouped: BTreeMap<(usize, usize), AlignedSpan> = BTreeMap::new();

    for (layer_index, layer) in layers.iter().enumerate() {
        for (shard, found) in &layer.matches {
            let (begin, end) = layer.normalized.to_original(found.begin, found.end);
            let span = grouped
                .entry((begin, end))
                .or_insert_with(|| AlignedSpan::empty(begin, end));

            span.candidate_ids.extend(found.candidate_ids.iter().copied());
            for (row, attrs) in &found.attrs_by_id {
                let merged = span.attrs_by_id.entry(*row).or_default();
                for (name, values) in attrs {
                    let slot = merged.entry(name.clone()).or_default();
                    for value in values {
                        if !slot.contains(value) {
                            slot.push(value.clone());
                        }
                    }
                }
            }
            span.origins.push(SpanOrigin {
                layer: layer_index,
                shard: *shard,
                candidate_ids: found.candidate_ids.clone(),
                begin: found.begin,
                end: found.end,
            });
        }
    }

    grouped.into_values().collect()
}
