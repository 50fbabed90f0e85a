//! Spotting automaton
//!
//! Walks normalized text character by character against one trie layer and
//! emits longest matches that start after a word separator (or at the start
//! of the text) and end at a word separator (or at the end of the text).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gazette_core::{AttributeFilter, AttributeMap, AttributeStore, Result, RowId};
use serde::Serialize;

use crate::trie::{Cursor, NodeId, Trie};

/// Match in one normalized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Rows whose synonym matched and passed the attribute filter
    pub candidate_ids: BTreeSet<RowId>,
    pub attrs_by_id: BTreeMap<RowId, AttributeMap>,
    /// Normalized text of the match
    pub text: String,
    /// Half-open character span in the normalized text
    pub begin: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    WaitingForBoundary,
    Reading,
}

/// Rows and attributes of a qualifying terminal
#[derive(Debug, Clone)]
struct Hit {
    attrs: BTreeMap<RowId, AttributeMap>,
}

/// Scanner over one trie layer
pub struct Spotter<'a> {
    trie: &'a Trie,
    store: &'a dyn AttributeStore,
    filter: &'a AttributeFilter,
    word_separator: char,
    hits: HashMap<NodeId, Option<Hit>>,
}

/// Mutable automaton state for one scan
struct Automaton {
    state: ScanState,
    cursor: Cursor,
    matched: String,
    /// Where the current attempt started
    begin: usize,
    /// Best terminal seen at a separator inside the current attempt
    shorter: Option<Match>,
    /// First separator consumed by the current attempt
    retry: Option<usize>,
    found: Vec<Match>,
}

impl<'a> Spotter<'a> {
    pub fn new(
        trie: &'a Trie,
        store: &'a dyn AttributeStore,
        filter: &'a AttributeFilter,
        word_separator: char,
    ) -> Self {
        Self {
            trie,
            store,
            filter,
            word_separator,
            hits: HashMap::new(),
        }
    }

    /// Terminal at `cursor` with rows passing the filter
    fn hit(&mut self, cursor: Cursor) -> Result<Option<Hit>> {
        let trie = self.trie;
        let Some((node, rows)) = trie.terminal(cursor) else {
            return Ok(None);
        };
        if let Some(cached) = self.hits.get(&node) {
            return Ok(cached.clone());
        }
        let attrs = self.store.query(rows, self.filter)?;
        let hit = (!attrs.is_empty()).then_some(Hit { attrs });
        self.hits.insert(node, hit.clone());
        Ok(hit)
    }

    /// All matches in `text`, ordered by position and never overlapping
    pub fn spot(&mut self, text: &str) -> Result<Vec<Match>> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let separator = self.word_separator;
        let root = self.trie.cursor();

        let mut a = Automaton {
            state: if chars.first() == Some(&separator) {
                ScanState::WaitingForBoundary
            } else {
                ScanState::Reading
            },
            cursor: root,
            matched: String::new(),
            begin: 0,
            shorter: None,
            retry: None,
            found: Vec::new(),
        };

        let mut i = 0;
        while i < total {
            if let Some(last) = a.found.last() {
                if i < last.end {
                    i = last.end;
                    if i >= total {
                        break;
                    }
                }
            }
            let c = chars[i];

            match a.state {
                ScanState::WaitingForBoundary => {
                    a.begin = i + 1;
                    if c == separator {
                        a.state = ScanState::Reading;
                    }
                }
                ScanState::Reading => {
                    if c == separator {
                        if let Some(hit) = self.hit(a.cursor)? {
                            a.shorter = Some(make_match(hit, &a.matched, a.begin, i));
                        }
                    }

                    if let Some(next) = self.trie.advance(a.cursor, c) {
                        if c == separator && a.retry.is_none() {
                            a.retry = Some(i);
                        }
                        a.matched.push(c);
                        a.cursor = next;
                    } else {
                        if c == separator {
                            if let Some(hit) = self.hit(a.cursor)? {
                                a.found.push(make_match(hit, &a.matched, a.begin, i));
                                a.shorter = None;
                            } else if let Some(alternative) = a.shorter.take() {
                                a.found.push(alternative);
                            }
                        } else {
                            if let Some(alternative) = a.shorter.take() {
                                a.found.push(alternative);
                            }
                            match a.retry.take() {
                                Some(resume) => i = resume,
                                None => a.state = ScanState::WaitingForBoundary,
                            }
                        }
                        a.matched.clear();
                        a.begin = i + 1;
                        a.cursor = root;
                    }
                }
            }
            i += 1;
        }

        if let Some(hit) = self.hit(a.cursor)? {
            a.found.push(make_match(hit, &a.matched, a.begin, total));
        } else if let Some(alternative) = a.shorter.take() {
            a.found.push(alternative);
        }

        Ok(a.found)
    }
}

fn make_match(hit: Hit, text: &str, begin: usize, end: usize) -> Match {
    Match {
        candidate_ids: hit.attrs.keys().copied().collect(),
        attrs_by_id: hit.attrs,
        text: text.to_string(),
        begin,
        end,
    }
}
