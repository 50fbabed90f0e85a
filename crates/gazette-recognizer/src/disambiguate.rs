//! Keyword disambiguation
//!
//! A span whose rows belong to more than one entity keeps only the entities
//! whose exclusive keywords best overlap the words between the neighbouring
//! spans. Exclusive keywords are an entity's keywords minus those of every
//! other candidate. Ties keep every tied entity.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gazette_core::{InternalId, RowId};
use tracing::debug;

use crate::align::{AlignedSpan, Layer};
use crate::keywords::KeywordIndex;

/// Narrow ambiguous spans in place. `spans` must be ordered by `begin`.
pub fn disambiguate(
    spans: &mut [AlignedSpan],
    layers: &[Layer],
    keywords: &KeywordIndex,
    word_separator: char,
) {
    let original_len = layers
        .first()
        .map(|l| l.normalized.original_len())
        .unwrap_or(0);

    for k in 0..spans.len() {
        let previous_end = if k > 0 { spans[k - 1].end } else { 0 };
        let next_begin = spans.get(k + 1).map_or(original_len, |s| s.begin);
        let span = &mut spans[k];

        let mut entities: BTreeMap<InternalId, Vec<RowId>> = BTreeMap::new();
        for &row in &span.candidate_ids {
            if let Some(entity) = keywords.entity_of(row) {
                entities.entry(entity).or_default().push(row);
            }
        }
        if entities.len() < 2 {
            continue;
        }

        let window = (previous_end.min(span.begin), next_begin.max(span.end));
        let mut context: HashMap<usize, BTreeSet<&str>> = HashMap::new();

        let mut scores: BTreeMap<InternalId, usize> = BTreeMap::new();
        for (&entity, rows) in &entities {
            let exclusive: BTreeSet<&str> = match keywords.keywords(entity) {
                Some(own) => own
                    .iter()
                    .filter(|token| {
                        !entities.keys().any(|&other| {
                            other != entity
                                && keywords
                                    .keywords(other)
                                    .is_some_and(|theirs| theirs.contains(*token))
                        })
                    })
                    .map(String::as_str)
                    .collect(),
                None => BTreeSet::new(),
            };

            let mut tokens: BTreeSet<&str> = BTreeSet::new();
            for &row in rows {
                for layer in span.layers_of(row) {
                    let words = context.entry(layer).or_insert_with(|| {
                        window_tokens(&layers[layer], window, word_separator)
                    });
                    tokens.extend(words.iter().copied());
                }
            }

            let score = exclusive.intersection(&tokens).count();
            scores.insert(entity, score);
        }

        let best = scores.values().copied().max().unwrap_or(0);
        let winners: BTreeSet<InternalId> = scores
            .iter()
            .filter(|(_, score)| **score == best)
            .map(|(&entity, _)| entity)
            .collect();
        debug!(
            "Span ({}, {}) resolved to entities {:?} with score {}",
            span.begin, span.end, winners, best
        );

        for (entity, rows) in &entities {
            if !winners.contains(entity) {
                for &row in rows {
                    span.discard(row);
                }
            }
        }
    }
}

/// Words of a layer's normalized text inside an original-text window
fn window_tokens(layer: &Layer, window: (usize, usize), word_separator: char) -> BTreeSet<&str> {
    let (begin, end) = layer.normalized.to_normalized(window.0, window.1);
    let text = &layer.normalized.text;
    let start = byte_offset(text, begin);
    let stop = byte_offset(text, end);
    text[start..stop]
        .split(word_separator)
        .filter(|t| !t.is_empty())
        .collect()
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}
