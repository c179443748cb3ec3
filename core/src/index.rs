use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = u32;

/// Dictionary entries grouped under one pointer record.
pub const BLOCK_SIZE: usize = 4;

/// Log-scaled term frequency, `1 + log10(tf)`; zero for an absent term.
pub fn log_tf(count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        1.0 + (count as f64).log10()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64, // 1 + log10(tf)
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn from_positions(doc_id: DocId, positions: Vec<u32>) -> Self {
        let weight = log_tf(positions.len());
        Self { doc_id, weight, positions }
    }

    pub fn term_frequency(&self) -> usize {
        self.positions.len()
    }
}

/// Postings of one term, sorted by doc id with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingsList {
    pub postings: Vec<Posting>,
}

impl PostingsList {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self { postings }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn document_frequency(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.postings.iter().map(|p| p.doc_id).collect()
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.postings[i])
    }

    /// `(doc_id, weight)` pairs, dropping positions.
    pub fn weights(&self) -> Vec<(DocId, f64)> {
        self.postings.iter().map(|p| (p.doc_id, p.weight)).collect()
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}

/// One decoded line of the postings file.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingsRecord {
    pub term: String,
    pub document_frequency: u32,
    pub postings: PostingsList,
}

/// Locates one dictionary block and the postings records of its terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerRecord {
    pub dictionary_offset: u64,
    pub postings_offsets: Vec<u64>,
}

/// Euclidean norms of every document's weight vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocLengths {
    pub lengths: BTreeMap<DocId, f64>,
}

impl DocLengths {
    pub fn num_docs(&self) -> u32 {
        self.lengths.len() as u32
    }

    pub fn get(&self, doc_id: DocId) -> Option<f64> {
        self.lengths.get(&doc_id).copied()
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.lengths.contains_key(&doc_id)
    }
}
