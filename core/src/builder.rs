use crate::codec;
use crate::error::{self, Result};
use crate::index::{DocId, DocLengths, PointerRecord, Posting, PostingsList, BLOCK_SIZE};
use crate::persist::{self, IndexPaths, Manifest, FORMAT_VERSION};
use crate::tokenizer::Analyzer;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collects documents and produces the blocked dictionary, postings, pointer
/// table and document-length artifacts.
pub struct IndexBuilder {
    analyzer: Arc<dyn Analyzer>,
    documents: BTreeMap<DocId, String>,
    parallel: bool,
}

/// Encoded artifacts of one build, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltIndex {
    pub dictionary: String,
    pub postings: String,
    pub pointers: String,
    pub doc_lengths: String,
    pub all_doc_ids: String,
    pub manifest: Manifest,
}

impl IndexBuilder {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer, documents: BTreeMap::new(), parallel: false }
    }

    /// Analyze documents on the rayon pool. Each worker owns whole documents,
    /// so the merged result is identical to a sequential build.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Adds a document. Text added twice under one id is appended, with
    /// positions continuing after the earlier text.
    pub fn add_document(&mut self, doc_id: DocId, text: &str) {
        let body = self.documents.entry(doc_id).or_default();
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(text);
    }

    pub fn build<I, S>(analyzer: Arc<dyn Analyzer>, documents: I) -> Result<BuiltIndex>
    where
        I: IntoIterator<Item = (DocId, S)>,
        S: AsRef<str>,
    {
        let mut builder = Self::new(analyzer);
        for (doc_id, text) in documents {
            builder.add_document(doc_id, text.as_ref());
        }
        builder.finish()
    }

    /// Fails only when an analyzer position does not fit in 32 bits.
    pub fn finish(self) -> Result<BuiltIndex> {
        let analyzer = self.analyzer.as_ref();
        let docs: Vec<(DocId, &str)> = self.documents.iter().map(|(id, text)| (*id, text.as_str())).collect();
        let analyze = |&(doc_id, text): &(DocId, &str)| (doc_id, analyzer.tokenize(text));
        let analyzed: Vec<(DocId, Vec<(String, usize)>)> = if self.parallel {
            docs.par_iter().map(analyze).collect()
        } else {
            docs.iter().map(analyze).collect()
        };

        // term -> doc -> positions; BTreeMaps keep terms and doc ids sorted.
        let mut terms: BTreeMap<String, BTreeMap<DocId, Vec<u32>>> = BTreeMap::new();
        let mut lengths = DocLengths::default();
        for (doc_id, tokens) in analyzed {
            lengths.lengths.insert(doc_id, 0.0);
            for (term, pos) in tokens {
                let pos = error::position(pos)?;
                terms.entry(term).or_default().entry(doc_id).or_default().push(pos);
            }
        }

        let mut lists: Vec<(String, PostingsList)> = Vec::with_capacity(terms.len());
        for (term, docs) in terms {
            let list = PostingsList::new(
                docs.into_iter()
                    .map(|(doc_id, positions)| Posting::from_positions(doc_id, positions))
                    .collect(),
            );
            for posting in &list {
                if let Some(sum) = lengths.lengths.get_mut(&posting.doc_id) {
                    *sum += posting.weight * posting.weight;
                }
            }
            lists.push((term, list));
        }
        for length in lengths.lengths.values_mut() {
            *length = length.sqrt();
        }

        let mut dictionary = String::new();
        let mut postings = String::new();
        let mut pointers = String::new();
        let mut block: Vec<(&str, u64)> = Vec::with_capacity(BLOCK_SIZE);
        for (term, list) in &lists {
            block.push((term.as_str(), postings.len() as u64));
            postings.push_str(&codec::encode_postings(term, list));
            if block.len() == BLOCK_SIZE {
                flush_block(&mut block, &mut dictionary, &mut pointers);
            }
        }
        if !block.is_empty() {
            flush_block(&mut block, &mut dictionary, &mut pointers);
        }

        let doc_ids: Vec<DocId> = lengths.lengths.keys().copied().collect();
        let manifest = Manifest {
            version: FORMAT_VERSION,
            block_size: BLOCK_SIZE,
            num_docs: lengths.num_docs(),
            num_terms: lists.len(),
            remove_stopwords: analyzer.removes_stopwords(),
        };
        tracing::info!(num_docs = manifest.num_docs, num_terms = manifest.num_terms, "built index");

        Ok(BuiltIndex {
            dictionary,
            postings,
            pointers,
            doc_lengths: codec::encode_doc_lengths(&lengths),
            all_doc_ids: codec::encode_doc_ids(&doc_ids),
            manifest,
        })
    }
}

/// Writes the pointer record for `block`, then its dictionary entries.
fn flush_block(block: &mut Vec<(&str, u64)>, dictionary: &mut String, pointers: &mut String) {
    let record = PointerRecord {
        dictionary_offset: dictionary.len() as u64,
        postings_offsets: block.iter().map(|(_, offset)| *offset).collect(),
    };
    pointers.push_str(&codec::encode_pointer(&record));
    for (term, _) in block.drain(..) {
        dictionary.push_str(&codec::encode_dictionary_entry(term));
    }
}

impl BuiltIndex {
    /// Replaces every artifact at `paths`.
    pub fn write(&self, paths: &IndexPaths) -> Result<()> {
        paths.create_dirs()?;
        persist::write_file(&paths.dictionary, &self.dictionary)?;
        persist::write_file(&paths.postings, &self.postings)?;
        persist::write_file(&paths.pointers, &self.pointers)?;
        persist::write_file(&paths.doc_lengths, &self.doc_lengths)?;
        persist::write_file(&paths.all_doc_ids, &self.all_doc_ids)?;
        persist::save_manifest(paths, &self.manifest)?;
        tracing::info!(
            dictionary = %paths.dictionary.display(),
            postings = %paths.postings.display(),
            bytes = self.postings.len(),
            "wrote index"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EnglishAnalyzer;

    fn analyzer() -> Arc<dyn Analyzer> {
        Arc::new(EnglishAnalyzer::new())
    }

    #[test]
    fn five_terms_make_two_blocks() {
        let built = IndexBuilder::build(analyzer(), [(1, "alpha bravo delta echo golf")]).unwrap();
        let records = codec::decode_pointers(&built.pointers).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dictionary_offset, 0);
        assert_eq!(records[0].postings_offsets.len(), 4);
        assert_eq!(records[1].postings_offsets.len(), 1);
        // |5|alpha|5|bravo|5|delta|4|echo
        assert_eq!(records[1].dictionary_offset, 27);
        assert!(built.dictionary.ends_with("|4|golf"));
    }

    #[test]
    fn duplicate_ids_append_positions() {
        let mut builder = IndexBuilder::new(analyzer());
        builder.add_document(4, "red fish");
        builder.add_document(4, "blue fish");
        let built = builder.finish().unwrap();
        let fish = built.postings.lines().find(|l| l.starts_with("fish ")).unwrap();
        let record = codec::decode_postings(fish).unwrap();
        assert_eq!(record.postings.postings[0].positions, vec![1, 3]);
        assert!(built.all_doc_ids == "4");
    }

    #[test]
    fn empty_collection_is_valid() {
        let built = IndexBuilder::build(analyzer(), Vec::<(DocId, &str)>::new()).unwrap();
        assert!(built.dictionary.is_empty());
        assert!(built.postings.is_empty());
        assert!(built.pointers.is_empty());
        assert_eq!(built.doc_lengths, "0");
        assert_eq!(built.manifest.num_terms, 0);
    }

    #[test]
    fn tokenless_document_counts_with_zero_length() {
        let built = IndexBuilder::build(analyzer(), [(1, "hello"), (2, "!!! ...")]).unwrap();
        let lengths = codec::decode_doc_lengths(&built.doc_lengths).unwrap();
        assert_eq!(lengths.num_docs(), 2);
        assert_eq!(lengths.get(2), Some(0.0));
        assert_eq!(lengths.get(1), Some(1.0));
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let docs = [(3, "the quick brown fox"), (1, "jumps over the lazy dog"), (2, "quick quick fox")];
        let sequential = IndexBuilder::build(analyzer(), docs).unwrap();
        let mut builder = IndexBuilder::new(analyzer()).parallel(true);
        for (id, text) in docs {
            builder.add_document(id, text);
        }
        assert_eq!(builder.finish().unwrap(), sequential);
    }

    /// Emits every word 2^32 slots apart.
    struct Sparse;

    impl Analyzer for Sparse {
        fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
            text.split_whitespace().enumerate().map(|(i, w)| (w.to_string(), i << 32)).collect()
        }
    }

    #[test]
    fn oversized_positions_fail_the_build() {
        let err = IndexBuilder::build(Arc::new(Sparse), [(1, "one two")]).unwrap_err();
        assert!(matches!(err, crate::IndexError::PositionOverflow(pos) if pos == 1 << 32));
        assert!(IndexBuilder::build(Arc::new(Sparse), [(1, "one")]).is_ok());
    }
}
