//! Text encodings of the on-disk artifacts.
//!
//! Postings record (one line per term):
//!
//! ```text
//! term df gapDocID,weight:deltaPos,deltaPos,... gapDocID,weight:deltaPos,...
//! ```
//!
//! Doc ids are gap-coded across the list and positions are delta-coded within
//! each posting; the first value of each run is absolute. Weights use Rust's
//! shortest round-trip float formatting, so decoding yields the exact `f64`.

use crate::index::{DocId, DocLengths, PointerRecord, Posting, PostingsList, PostingsRecord, BLOCK_SIZE};
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("empty record")]
    Empty,

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {value:?}")]
    Invalid { field: &'static str, value: String },

    #[error("invalid utf-8")]
    InvalidUtf8,

    #[error("doc ids not strictly increasing after {0}")]
    UnorderedDocIds(DocId),

    #[error("positions not strictly increasing in doc {0}")]
    UnorderedPositions(DocId),

    #[error("document frequency {declared} does not match {actual} postings")]
    FrequencyMismatch { declared: u32, actual: usize },

    #[error("expected term {expected:?}, found {found:?}")]
    TermMismatch { expected: String, found: String },
}

fn parse<T: FromStr>(value: &str, field: &'static str) -> Result<T, CodecError> {
    value.parse().map_err(|_| CodecError::Invalid { field, value: value.to_string() })
}

pub fn encode_postings(term: &str, postings: &PostingsList) -> String {
    let mut line = String::with_capacity(term.len() + 16 * postings.postings.len());
    line.push_str(term);
    let _ = write!(line, " {}", postings.document_frequency());
    let mut prev_doc = 0;
    for posting in postings {
        let _ = write!(line, " {},{}:", posting.doc_id - prev_doc, posting.weight);
        let mut prev_pos = 0;
        for (i, &pos) in posting.positions.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{}", pos - prev_pos);
            prev_pos = pos;
        }
        prev_doc = posting.doc_id;
    }
    line.push('\n');
    line
}

pub fn decode_postings(line: &str) -> Result<PostingsRecord, CodecError> {
    let mut fields = line.split_ascii_whitespace();
    let term = fields.next().ok_or(CodecError::Empty)?;
    let document_frequency: u32 = parse(fields.next().ok_or(CodecError::Missing("document frequency"))?, "document frequency")?;

    let mut postings = Vec::with_capacity(document_frequency as usize);
    let mut doc_id: DocId = 0;
    for item in fields {
        let (head, deltas) = item.split_once(':').ok_or(CodecError::Missing("positions"))?;
        let (gap, weight) = head.split_once(',').ok_or(CodecError::Missing("weight"))?;
        let gap: DocId = parse(gap, "doc id gap")?;
        if !postings.is_empty() && gap == 0 {
            return Err(CodecError::UnorderedDocIds(doc_id));
        }
        doc_id = doc_id
            .checked_add(gap)
            .ok_or_else(|| CodecError::Invalid { field: "doc id gap", value: gap.to_string() })?;
        let weight: f64 = parse(weight, "weight")?;

        if deltas.is_empty() {
            return Err(CodecError::Missing("positions"));
        }
        let mut positions = Vec::new();
        let mut pos: u32 = 0;
        for (i, delta) in deltas.split(',').enumerate() {
            let delta: u32 = parse(delta, "position delta")?;
            if i > 0 && delta == 0 {
                return Err(CodecError::UnorderedPositions(doc_id));
            }
            pos = pos
                .checked_add(delta)
                .ok_or_else(|| CodecError::Invalid { field: "position delta", value: delta.to_string() })?;
            positions.push(pos);
        }
        postings.push(Posting { doc_id, weight, positions });
    }

    if postings.len() != document_frequency as usize {
        return Err(CodecError::FrequencyMismatch { declared: document_frequency, actual: postings.len() });
    }
    Ok(PostingsRecord {
        term: term.to_string(),
        document_frequency,
        postings: PostingsList::new(postings),
    })
}

pub fn encode_pointer(record: &PointerRecord) -> String {
    let mut line = record.dictionary_offset.to_string();
    for offset in &record.postings_offsets {
        let _ = write!(line, ",{offset}");
    }
    line.push('\n');
    line
}

pub fn decode_pointer(token: &str) -> Result<PointerRecord, CodecError> {
    let mut fields = token.split(',');
    let dictionary_offset = parse(fields.next().filter(|f| !f.is_empty()).ok_or(CodecError::Empty)?, "dictionary offset")?;
    let postings_offsets = fields
        .map(|f| parse(f, "postings offset"))
        .collect::<Result<Vec<u64>, _>>()?;
    if postings_offsets.is_empty() {
        return Err(CodecError::Missing("postings offset"));
    }
    if postings_offsets.len() > BLOCK_SIZE {
        return Err(CodecError::Invalid { field: "pointer record", value: token.to_string() });
    }
    Ok(PointerRecord { dictionary_offset, postings_offsets })
}

/// Whitespace separated pointer records.
pub fn decode_pointers(text: &str) -> Result<Vec<PointerRecord>, CodecError> {
    text.split_ascii_whitespace().map(decode_pointer).collect()
}

pub fn encode_dictionary_entry(term: &str) -> String {
    format!("|{}|{}", term.len(), term)
}

/// Decodes `count` length-prefixed terms from the start of `bytes`.
pub fn decode_dictionary_block(bytes: &[u8], count: usize) -> Result<Vec<String>, CodecError> {
    let mut terms = Vec::with_capacity(count);
    let mut rest = bytes;
    for _ in 0..count {
        let body = rest.strip_prefix(b"|").ok_or(CodecError::Missing("dictionary entry"))?;
        let bar = body.iter().position(|&b| b == b'|').ok_or(CodecError::Missing("term length"))?;
        let len_text = std::str::from_utf8(&body[..bar]).map_err(|_| CodecError::InvalidUtf8)?;
        let len: usize = parse(len_text, "term length")?;
        let body = &body[bar + 1..];
        if body.len() < len {
            return Err(CodecError::Missing("term bytes"));
        }
        let term = std::str::from_utf8(&body[..len]).map_err(|_| CodecError::InvalidUtf8)?;
        terms.push(term.to_string());
        rest = &body[len..];
    }
    Ok(terms)
}

pub fn encode_doc_lengths(lengths: &DocLengths) -> String {
    let mut out = lengths.num_docs().to_string();
    for (doc_id, length) in &lengths.lengths {
        let _ = write!(out, " {doc_id},{length}");
    }
    out
}

pub fn decode_doc_lengths(text: &str) -> Result<DocLengths, CodecError> {
    let mut fields = text.split_ascii_whitespace();
    let total: u32 = parse(fields.next().ok_or(CodecError::Empty)?, "document count")?;
    let mut lengths = DocLengths::default();
    for item in fields {
        let (doc_id, length) = item.split_once(',').ok_or(CodecError::Missing("document length"))?;
        lengths.lengths.insert(parse(doc_id, "doc id")?, parse(length, "document length")?);
    }
    if lengths.num_docs() != total {
        return Err(CodecError::Invalid { field: "document count", value: total.to_string() });
    }
    Ok(lengths)
}

pub fn encode_doc_ids(doc_ids: &[DocId]) -> String {
    doc_ids.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(" ")
}

pub fn decode_doc_ids(text: &str) -> Result<Vec<DocId>, CodecError> {
    text.split_ascii_whitespace().map(|d| parse(d, "doc id")).collect()
}
