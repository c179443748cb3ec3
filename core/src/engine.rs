use crate::config::SearchConfig;
use crate::error::{self, Result};
use crate::handle::{IndexHandle, IndexReader};
use crate::index::{DocId, PostingsList};
use crate::persist::IndexPaths;
use crate::query::{self, Operand, Query};
use crate::ranking;
use crate::tokenizer::{Analyzer, EnglishAnalyzer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Boolean,
    Ranked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    /// Cosine score; boolean matches carry none.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub mode: QueryMode,
    /// Every matching document, before the top-K cut.
    pub total_hits: usize,
    pub hits: Vec<Hit>,
}

impl SearchOutcome {
    pub fn doc_ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|h| h.doc_id).collect()
    }
}

/// Answers boolean, phrase and ranked queries against one opened index.
pub struct SearchEngine {
    handle: Arc<IndexHandle>,
    analyzer: Arc<dyn Analyzer>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(handle: Arc<IndexHandle>, analyzer: Arc<dyn Analyzer>, config: SearchConfig) -> Self {
        Self { handle, analyzer, config }
    }

    /// Opens the index at `paths` with an English analyzer built from
    /// `config`. The stopword setting recorded at build time wins over the
    /// configured one, so queries are analyzed the way documents were.
    pub fn open(paths: IndexPaths, mut config: SearchConfig) -> Result<Self> {
        let handle = IndexHandle::open(paths, config.workers)?;
        if let Some(manifest) = handle.manifest() {
            if manifest.remove_stopwords != config.analyzer.remove_stopwords {
                tracing::warn!(
                    indexed = manifest.remove_stopwords,
                    configured = config.analyzer.remove_stopwords,
                    "stopword setting differs from the index; using the index setting"
                );
                config.analyzer.remove_stopwords = manifest.remove_stopwords;
            }
        }
        let analyzer = EnglishAnalyzer::from_config(&config.analyzer)?;
        Ok(Self::new(Arc::new(handle), Arc::new(analyzer), config))
    }

    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs `text`; `relevant` lists doc ids known to be relevant, which join
    /// the feedback set of a ranked query.
    pub fn search(&self, text: &str, relevant: &[DocId]) -> Result<SearchOutcome> {
        self.search_with(text, relevant, self.config.top_k)
    }

    /// Like [`search`](Self::search) with a per-query K for both ranking
    /// passes; 0 keeps every scored document. Boolean results are not cut.
    pub fn search_with(&self, text: &str, relevant: &[DocId], top_k: usize) -> Result<SearchOutcome> {
        match Query::parse(text) {
            Query::Boolean(operands) => {
                let docs = self.boolean(&operands)?;
                tracing::debug!(query = text, hits = docs.len(), "boolean query");
                Ok(SearchOutcome {
                    mode: QueryMode::Boolean,
                    total_hits: docs.len(),
                    hits: docs.into_iter().map(|doc_id| Hit { doc_id, score: None }).collect(),
                })
            }
            Query::FreeText(text) => {
                let (ranked, total_hits) = self.rank(&text, relevant, top_k)?;
                tracing::debug!(query = %text, hits = ranked.len(), total_hits, "ranked query");
                Ok(SearchOutcome {
                    mode: QueryMode::Ranked,
                    total_hits,
                    hits: ranked
                        .into_iter()
                        .map(|(doc_id, score)| Hit { doc_id, score: Some(score) })
                        .collect(),
                })
            }
        }
    }

    /// Documents matching every operand, ascending.
    pub fn boolean(&self, operands: &[Operand]) -> Result<Vec<DocId>> {
        let mut reader = self.handle.reader()?;
        let mut sets = Vec::with_capacity(operands.len());
        for operand in operands {
            let text = match operand {
                Operand::Term(text) | Operand::Phrase(text) => text,
            };
            let set = self.phrase_with(&mut reader, text)?;
            if set.is_empty() {
                return Ok(Vec::new());
            }
            sets.push(set);
        }
        Ok(query::intersect_all(sets))
    }

    /// Documents containing `phrase` as one contiguous run, ascending.
    pub fn phrase(&self, phrase: &str) -> Result<Vec<DocId>> {
        let mut reader = self.handle.reader()?;
        self.phrase_with(&mut reader, phrase)
    }

    fn phrase_with(&self, reader: &mut IndexReader<'_>, phrase: &str) -> Result<Vec<DocId>> {
        let tokens = self.analyzer.tokenize(phrase);
        let Some(&(_, base)) = tokens.first() else { return Ok(Vec::new()) };

        let mut lists: Vec<(PostingsList, u32)> = Vec::with_capacity(tokens.len());
        for (term, pos) in &tokens {
            let list = reader.postings(term)?;
            if list.is_empty() {
                return Ok(Vec::new());
            }
            lists.push((list, error::position(pos - base)?));
        }
        if let [(only, _)] = lists.as_slice() {
            return Ok(only.doc_ids());
        }

        let candidates = query::intersect_all(lists.iter().map(|(list, _)| list.doc_ids()).collect());
        let mut matches = Vec::with_capacity(candidates.len());
        for doc_id in candidates {
            let mut terms: Vec<(&[u32], u32)> = Vec::with_capacity(lists.len());
            for (list, offset) in &lists {
                if let Some(posting) = list.get(doc_id) {
                    terms.push((posting.positions.as_slice(), *offset));
                }
            }
            if terms.len() == lists.len() && query::contiguous(&terms) {
                matches.push(doc_id);
            }
        }
        Ok(matches)
    }

    /// Cosine ranking of free text, refined by one Rocchio pass when enabled.
    pub fn ranked(&self, text: &str, relevant: &[DocId]) -> Result<Vec<(DocId, f64)>> {
        Ok(self.rank(text, relevant, self.config.top_k)?.0)
    }

    /// Top-`top_k` hits and the number of documents with a positive final score.
    fn rank(&self, text: &str, relevant: &[DocId], top_k: usize) -> Result<(Vec<(DocId, f64)>, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (term, _) in self.analyzer.tokenize(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        if self.config.expand_synonyms {
            let originals: Vec<(String, usize)> = counts.iter().map(|(t, n)| (t.clone(), *n)).collect();
            for (term, n) in originals {
                for synonym in self.analyzer.synonyms(&term) {
                    counts.entry(synonym).or_insert(n);
                }
            }
        }

        let mut reader = self.handle.reader()?;
        let mut postings: BTreeMap<String, Vec<(DocId, f64)>> = BTreeMap::new();
        for term in counts.keys() {
            postings.insert(term.clone(), reader.postings(term)?.weights());
        }

        let lengths = self.handle.doc_lengths();
        let vector = ranking::query_vector(&counts, self.handle.num_docs(), |term| {
            postings.get(term).map_or(0, |p| p.len() as u32)
        });
        let scores = ranking::cosine_scores(
            vector
                .iter()
                .filter_map(|(term, &w)| postings.get(term).map(|p| (w, p.as_slice()))),
            lengths,
        );
        let matched = positive(&scores);
        let initial = ranking::top_k(scores, top_k);

        let feedback = &self.config.feedback;
        if !feedback.enabled || (initial.is_empty() && relevant.is_empty()) {
            return Ok((initial, matched));
        }
        let feedback_set: BTreeSet<DocId> = initial.iter().map(|(d, _)| *d).chain(relevant.iter().copied()).collect();
        let weights = self.handle.term_weights()?;
        let refined = ranking::rocchio(&vector, &feedback_set, &weights, lengths, feedback);
        tracing::debug!(
            initial_terms = vector.len(),
            refined_terms = refined.len(),
            feedback_docs = feedback_set.len(),
            "rocchio refinement"
        );
        let scores = ranking::score_with_weights(&refined, &weights, lengths);
        let matched = positive(&scores);
        Ok((ranking::top_k(scores, top_k), matched))
    }
}

fn positive(scores: &HashMap<DocId, f64>) -> usize {
    scores.values().filter(|s| **s > 0.0).count()
}
