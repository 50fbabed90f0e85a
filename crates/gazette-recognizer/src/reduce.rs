//! Span flattening and overlap reduction

use std::collections::{BTreeMap, BTreeSet};

use crate::align::AlignedSpan;

/// Final result: attribute values per original location
pub type SpanAttributes = BTreeMap<(usize, usize), BTreeMap<String, BTreeSet<String>>>;

/// Collapse aligned spans into `(begin, end) -> attr_name -> values`.
///
/// Every `(begin, end, name, value)` tuple is visited in order of begin
/// ascending, then end descending. A tuple strictly nested inside the last
/// kept tuple is dropped; every other tuple lands in its own location.
pub fn flatten_spans(spans: &[AlignedSpan]) -> SpanAttributes {
    let mut tuples: Vec<(usize, usize, &str, &str)> = Vec::new();
    for span in spans {
        for row in &span.candidate_ids {
            let Some(attrs) = span.attrs_by_id.get(row) else {
                continue;
            };
            for (name, values) in attrs {
                for value in values {
                    tuples.push((span.begin, span.end, name.as_str(), value.as_str()));
                }
            }
        }
    }
    tuples.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(b.1.cmp(&a.1))
            .then(a.2.cmp(b.2))
            .then(a.3.cmp(b.3))
    });

    let mut result = SpanAttributes::new();
    let mut kept: Option<(usize, usize)> = None;
    for (begin, end, name, value) in tuples {
        if let Some((kb, ke)) = kept {
            let nested = (kb <= begin && begin < ke && kb < end && end < ke)
                || (kb < begin && begin < ke && kb < end && end <= ke);
            if nested {
                continue;
            }
        }
        kept = Some((begin, end));
        result
            .entry((begin, end))
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
    }
    result
}

/// `next` starts inside `current`
fn intersects(current: (usize, usize), next: (usize, usize)) -> bool {
    next.0 >= current.0 && next.0 < current.1
}

fn length(span: (usize, usize)) -> usize {
    span.1 - span.0
}

/// Resolve overlapping locations to a non-overlapping set, ordered by begin.
///
/// Locations are visited in order of begin, then length. Of two adjacent
/// overlapping locations the longer survives and carries the loser along
/// as an alternative; on a tie the earlier one wins. When the current
/// location loses, its first carried alternative that does not overlap the
/// winner is restored. A final pass drops anything still overlapping the
/// previous kept location.
pub fn reduce_spans<I>(locations: I) -> Vec<(usize, usize)>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut sorted: Vec<(usize, usize)> = locations
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    sorted.sort_by_key(|&span| (span.0, length(span)));

    let mut slots: Vec<Vec<(usize, usize)>> = sorted.into_iter().map(|s| vec![s]).collect();
    for i in 0..slots.len().saturating_sub(1) {
        let (Some(&current), Some(&next)) = (slots[i].first(), slots[i + 1].first()) else {
            continue;
        };
        if !intersects(current, next) {
            continue;
        }

        if length(current) >= length(next) {
            let carried = std::mem::take(&mut slots[i]);
            let loser = std::mem::take(&mut slots[i + 1]);
            slots[i + 1] = carried;
            slots[i + 1].extend(loser);
        } else if let Some(&alternative) = slots[i][1..]
            .iter()
            .find(|&&alt| !intersects(alt, next) && !intersects(next, alt))
        {
            slots[i] = vec![alternative];
        } else {
            let carried = std::mem::take(&mut slots[i]);
            slots[i + 1].extend(carried);
        }
    }

    let mut reduced: Vec<(usize, usize)> = Vec::new();
    let winners: BTreeSet<(usize, usize)> = slots.iter().filter_map(|s| s.first().copied()).collect();
    for span in winners {
        match reduced.last() {
            Some(&last) if span.0 < last.1 => continue,
            _ => reduced.push(span),
        }
    }
    reduced
}
