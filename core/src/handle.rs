use crate::codec::{self, CodecError};
use crate::error::{IndexError, Result};
use crate::index::{DocId, DocLengths, PointerRecord, PostingsList, PostingsRecord, BLOCK_SIZE};
use crate::persist::{self, IndexPaths, Manifest, FORMAT_VERSION};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// An opened, read-only index.
///
/// The handle holds the pointer table, document lengths and doc id list in
/// memory. Lookups go through an [`IndexReader`], which owns its own file
/// cursors, so one handle can serve concurrent queries.
pub struct IndexHandle {
    paths: IndexPaths,
    manifest: Option<Manifest>,
    pointers: Vec<PointerRecord>,
    dictionary_len: u64,
    doc_lengths: DocLengths,
    doc_ids: Vec<DocId>,
    pool: rayon::ThreadPool,
    term_weights: Mutex<Option<Arc<TermWeights>>>,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("paths", &self.paths)
            .field("blocks", &self.pointers.len())
            .field("num_docs", &self.doc_lengths.num_docs())
            .finish()
    }
}

impl IndexHandle {
    /// Opens every artifact at `paths`. `workers` sizes the pool used for
    /// full-index scans; 0 picks rayon's default.
    pub fn open(paths: IndexPaths, workers: usize) -> Result<Self> {
        for path in paths.required() {
            if !path.is_file() {
                return Err(IndexError::MissingFile(path.to_path_buf()));
            }
        }
        let manifest = persist::load_manifest(&paths)?;
        if let Some(m) = &manifest {
            if m.version != FORMAT_VERSION || m.block_size != BLOCK_SIZE {
                return Err(IndexError::Incompatible(format!(
                    "version {} with block size {}",
                    m.version, m.block_size
                )));
            }
        }
        let pointers = persist::load_pointers(&paths)?;
        let doc_lengths = persist::load_doc_lengths(&paths)?;
        let doc_ids = persist::load_doc_ids(&paths)?;
        if !doc_lengths.lengths.keys().copied().eq(doc_ids.iter().copied()) {
            return Err(IndexError::corrupt(
                "all_doc_ids",
                0,
                CodecError::Invalid {
                    field: "doc id list",
                    value: format!("{} ids for {} document lengths", doc_ids.len(), doc_lengths.num_docs()),
                },
            ));
        }
        let dictionary_len = fs::metadata(&paths.dictionary)?.len();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        tracing::info!(
            blocks = pointers.len(),
            num_docs = doc_lengths.num_docs(),
            workers = pool.current_num_threads(),
            "opened index"
        );
        Ok(Self {
            paths,
            manifest,
            pointers,
            dictionary_len,
            doc_lengths,
            doc_ids,
            pool,
            term_weights: Mutex::new(None),
        })
    }

    pub fn reader(&self) -> Result<IndexReader<'_>> {
        Ok(IndexReader {
            handle: self,
            dictionary: File::open(&self.paths.dictionary)?,
            postings: BufReader::new(File::open(&self.paths.postings)?),
        })
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn num_docs(&self) -> u32 {
        self.doc_lengths.num_docs()
    }

    pub fn doc_lengths(&self) -> &DocLengths {
        &self.doc_lengths
    }

    pub fn doc_ids(&self) -> &[DocId] {
        &self.doc_ids
    }

    pub fn num_blocks(&self) -> usize {
        self.pointers.len()
    }

    /// Every term's `(doc, weight)` pairs, scanned once and then cached.
    pub fn term_weights(&self) -> Result<Arc<TermWeights>> {
        let mut cached = self.term_weights.lock();
        if let Some(weights) = cached.as_ref() {
            return Ok(Arc::clone(weights));
        }
        let weights = Arc::new(self.scan_postings()?);
        *cached = Some(Arc::clone(&weights));
        Ok(weights)
    }

    /// Parses the postings file on the worker pool, one record-aligned byte
    /// range per worker. Malformed records are logged and skipped.
    fn scan_postings(&self) -> Result<TermWeights> {
        let path = self.paths.postings.as_path();
        let len = fs::metadata(path)?.len();
        let chunks = chunk_ranges(path, len, self.pool.current_num_threads())?;
        let scans: Vec<ChunkScan> = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|&(start, end)| scan_chunk(path, start, end))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut merged = TermWeights::default();
        for scan in scans {
            merged.skipped += scan.skipped;
            for (term, entry) in scan.terms {
                if merged.terms.insert(term, entry).is_some() {
                    tracing::warn!("duplicate postings record while merging scan chunks");
                }
            }
        }
        tracing::info!(
            chunks = chunks.len(),
            terms = merged.terms.len(),
            skipped = merged.skipped,
            "scanned postings"
        );
        Ok(merged)
    }

    /// Releases cached scan state. Dropping the handle does the same.
    pub fn close(self) {
        self.term_weights.lock().take();
        tracing::debug!(dictionary = %self.paths.dictionary.display(), "closed index");
    }
}

/// Per-query cursor over the dictionary and postings files.
pub struct IndexReader<'a> {
    handle: &'a IndexHandle,
    dictionary: File,
    postings: BufReader<File>,
}

impl<'a> IndexReader<'a> {
    /// Terms of one dictionary block. The block ends where the next one starts.
    fn block_terms(&mut self, block: usize) -> Result<Vec<String>> {
        let handle = self.handle;
        let pointers = &handle.pointers;
        let start = pointers[block].dictionary_offset;
        let end = pointers
            .get(block + 1)
            .map(|next| next.dictionary_offset)
            .unwrap_or(handle.dictionary_len);
        if end < start {
            return Err(IndexError::corrupt("pointers", start, CodecError::Missing("dictionary block")));
        }
        let mut buf = vec![0u8; (end - start) as usize];
        self.dictionary.seek(SeekFrom::Start(start))?;
        self.dictionary.read_exact(&mut buf)?;
        codec::decode_dictionary_block(&buf, pointers[block].postings_offsets.len())
            .map_err(|e| IndexError::corrupt("dictionary", start, e))
    }

    /// Byte offset of `term`'s postings record, or `None` if it was never indexed.
    pub fn locate(&mut self, term: &str) -> Result<Option<u64>> {
        let handle = self.handle;
        let (mut lo, mut hi) = (0, handle.pointers.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let terms = self.block_terms(mid)?;
            let (first, last) = match (terms.first(), terms.last()) {
                (Some(first), Some(last)) => (first.as_str(), last.as_str()),
                _ => return Ok(None),
            };
            if term < first {
                hi = mid;
            } else if term > last {
                lo = mid + 1;
            } else {
                return Ok(terms
                    .iter()
                    .position(|t| t == term)
                    .map(|i| handle.pointers[mid].postings_offsets[i]));
            }
        }
        Ok(None)
    }

    /// Decodes the postings record starting at `offset`.
    pub fn decode(&mut self, offset: u64) -> Result<PostingsRecord> {
        self.postings.seek(SeekFrom::Start(offset))?;
        let mut line = Vec::new();
        self.postings.read_until(b'\n', &mut line)?;
        let line = std::str::from_utf8(&line).map_err(|_| IndexError::corrupt("postings", offset, CodecError::InvalidUtf8))?;
        codec::decode_postings(line).map_err(|e| IndexError::corrupt("postings", offset, e))
    }

    /// Postings of `term`; empty when the term is not in the dictionary.
    pub fn postings(&mut self, term: &str) -> Result<PostingsList> {
        let Some(offset) = self.locate(term)? else {
            tracing::debug!(term, "term not in dictionary");
            return Ok(PostingsList::empty());
        };
        let record = self.decode(offset)?;
        if record.term != term {
            return Err(IndexError::corrupt(
                "postings",
                offset,
                CodecError::TermMismatch { expected: term.to_string(), found: record.term },
            ));
        }
        Ok(record.postings)
    }

    pub fn document_frequency(&mut self, term: &str) -> Result<u32> {
        Ok(self.postings(term)?.document_frequency())
    }
}

/// Weights of one term across the whole collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermEntry {
    pub postings: Vec<(DocId, f64)>,
    /// Sum of all weights in `postings`.
    pub total: f64,
}

/// Positions-free view of the entire postings file.
#[derive(Debug, Clone, Default)]
pub struct TermWeights {
    pub terms: HashMap<String, TermEntry>,
    /// Records dropped as malformed.
    pub skipped: usize,
}

impl TermWeights {
    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

struct ChunkScan {
    terms: HashMap<String, TermEntry>,
    skipped: usize,
}

/// Splits `[0, len)` into at most `chunks` ranges whose starts fall on record
/// boundaries, so no record is divided between workers.
pub(crate) fn chunk_ranges(path: &Path, len: u64, chunks: usize) -> Result<Vec<(u64, u64)>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let chunks = chunks.max(1) as u64;
    let step = (len / chunks).max(1);
    let mut reader = BufReader::new(File::open(path)?);
    let mut starts = vec![0u64];
    let mut last = 0u64;
    let mut skip = Vec::new();
    for i in 1..chunks {
        let guess = step * i;
        if guess >= len {
            break;
        }
        if guess <= last {
            continue;
        }
        // Reading from guess - 1 through the next newline lands exactly on
        // guess when the byte before it already ends a record.
        reader.seek(SeekFrom::Start(guess - 1))?;
        skip.clear();
        let read = reader.read_until(b'\n', &mut skip)? as u64;
        let aligned = guess - 1 + read;
        if aligned >= len {
            break;
        }
        if aligned > last {
            starts.push(aligned);
            last = aligned;
        }
    }
    let mut ranges = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(len);
        ranges.push((start, end));
    }
    Ok(ranges)
}

fn scan_chunk(path: &Path, start: u64, end: u64) -> Result<ChunkScan> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = BufReader::new(file.take(end - start));
    let mut scan = ChunkScan { terms: HashMap::new(), skipped: 0 };
    let mut offset = start;
    for line in reader.split(b'\n') {
        let line = line?;
        let record_offset = offset;
        offset += line.len() as u64 + 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let decoded = std::str::from_utf8(&line)
            .map_err(|_| CodecError::InvalidUtf8)
            .and_then(codec::decode_postings);
        match decoded {
            Ok(record) => {
                let postings = record.postings.weights();
                let total: f64 = postings.iter().map(|(_, w)| w).sum();
                scan.terms.insert(record.term, TermEntry { postings, total });
            }
            Err(err) => {
                tracing::warn!(offset = record_offset, %err, "skipping malformed postings record");
                scan.skipped += 1;
            }
        }
    }
    Ok(scan)
}
