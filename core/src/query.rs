use crate::index::DocId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One side of an `AND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Term(String),
    Phrase(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Boolean(Vec<Operand>),
    FreeText(String),
}

impl Query {
    /// A query containing the word `AND` is boolean; anything else is ranked
    /// free text. Operands lose surrounding quotes, and an operand with an
    /// inner space is a phrase.
    pub fn parse(text: &str) -> Query {
        let words: Vec<&str> = text.split_whitespace().collect();
        if !words.contains(&"AND") {
            return Query::FreeText(text.trim().to_string());
        }
        let operands = words
            .split(|w| *w == "AND")
            .filter_map(|group| {
                let joined = group.join(" ");
                let operand = joined.trim_matches('"').trim();
                if operand.is_empty() {
                    None
                } else if operand.contains(' ') {
                    Some(Operand::Phrase(operand.to_string()))
                } else {
                    Some(Operand::Term(operand.to_string()))
                }
            })
            .collect();
        Query::Boolean(operands)
    }
}

/// Two-pointer intersection of sorted doc id lists.
pub fn intersect(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

/// Intersects all sets, always combining the two smallest remaining ones.
/// No sets yields an empty result.
pub fn intersect_all(sets: Vec<Vec<DocId>>) -> Vec<DocId> {
    let mut slots: Vec<Vec<DocId>> = Vec::with_capacity(sets.len() * 2);
    let mut heap = BinaryHeap::new();
    for set in sets {
        heap.push(Reverse((set.len(), slots.len())));
        slots.push(set);
    }
    loop {
        let Some(Reverse((_, smallest))) = heap.pop() else { return Vec::new() };
        let Some(Reverse((_, next))) = heap.pop() else {
            return std::mem::take(&mut slots[smallest]);
        };
        let merged = intersect(&slots[smallest], &slots[next]);
        if merged.is_empty() {
            return merged;
        }
        slots[smallest].clear();
        slots[next].clear();
        heap.push(Reverse((merged.len(), slots.len())));
        slots.push(merged);
    }
}

/// True when one start position places every phrase term at its offset.
/// `terms` pairs each term's sorted positions in a document with the term's
/// offset from the first phrase term.
pub fn contiguous(terms: &[(&[u32], u32)]) -> bool {
    let Some(&(first, first_offset)) = terms.first() else { return false };
    first.iter().any(|&pos| {
        let Some(start) = pos.checked_sub(first_offset) else { return false };
        terms[1..].iter().all(|&(positions, offset)| {
            start
                .checked_add(offset)
                .is_some_and(|want| positions.binary_search(&want).is_ok())
        })
    })
}
