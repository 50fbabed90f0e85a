//! Keyword index for disambiguation
//!
//! When one normalized synonym belongs to several entities, each of those
//! entities gets the set of tokens appearing in any of its synonyms. The
//! disambiguator compares those sets against the words around a match.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gazette_core::{InternalId, RowId};
use serde::{Deserialize, Serialize};

/// Distinguishing tokens per entity and the row to entity map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordIndex {
    keywords: BTreeMap<InternalId, BTreeSet<String>>,
    row_entities: BTreeMap<RowId, InternalId>,
}

impl KeywordIndex {
    /// True when no entity has keywords; disambiguation is skipped then
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self, entity: InternalId) -> Option<&BTreeSet<String>> {
        self.keywords.get(&entity)
    }

    pub fn entity_of(&self, row: RowId) -> Option<InternalId> {
        self.row_entities.get(&row).copied()
    }

    /// Entities carrying keywords
    pub fn len(&self) -> usize {
        self.keywords.len()
    }
}

/// Collects synonyms during compilation
#[derive(Debug, Default)]
pub struct KeywordIndexBuilder {
    word_separator: char,
    disambiguate_all: bool,
    owners: HashMap<String, BTreeSet<InternalId>>,
    tokens: BTreeMap<InternalId, BTreeSet<String>>,
    row_entities: BTreeMap<RowId, InternalId>,
}

impl KeywordIndexBuilder {
    pub fn new(word_separator: char, disambiguate_all: bool) -> Self {
        Self {
            word_separator,
            disambiguate_all,
            ..Self::default()
        }
    }

    /// Record a normalized synonym of `entity` found on `row`
    pub fn add(&mut self, row: RowId, entity: InternalId, synonym: &str) {
        self.row_entities.insert(row, entity);
        self.owners
            .entry(synonym.to_string())
            .or_default()
            .insert(entity);
        self.tokens.entry(entity).or_default().extend(
            synonym
                .split(self.word_separator)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }

    /// Keep keywords only for entities sharing a synonym with another entity,
    /// or for all entities when `disambiguate_all` is set
    pub fn build(self) -> KeywordIndex {
        let colliding: BTreeSet<InternalId> = if self.disambiguate_all {
            self.tokens.keys().copied().collect()
        } else {
            self.owners
                .values()
                .filter(|owners| owners.len() > 1)
                .flatten()
                .copied()
                .collect()
        };

        let keywords = self
            .tokens
            .into_iter()
            .filter(|(entity, _)| colliding.contains(entity))
            .collect();

        KeywordIndex {
            keywords,
            row_entities: self.row_entities,
        }
    }
}
