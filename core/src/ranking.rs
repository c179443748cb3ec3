//! Vector-space scoring: tf-idf query weights, cosine scores against the
//! stored document lengths, and Rocchio query refinement.

use crate::config::RocchioConfig;
use crate::handle::TermWeights;
use crate::index::{log_tf, DocId, DocLengths};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Term -> query weight. Only non-zero weights are kept.
pub type QueryVector = BTreeMap<String, f64>;

/// `log10(N / df)`, or zero for a term no document contains.
pub fn idf(num_docs: u32, document_frequency: u32) -> f64 {
    if document_frequency == 0 || num_docs == 0 {
        return 0.0;
    }
    (num_docs as f64 / document_frequency as f64).log10()
}

/// Unit-length tf-idf vector for a query. `counts` holds each term's query tf,
/// `document_frequency` the term's df. All-zero weights give an empty vector.
pub fn query_vector<F>(counts: &BTreeMap<String, usize>, num_docs: u32, mut document_frequency: F) -> QueryVector
where
    F: FnMut(&str) -> u32,
{
    let raw: Vec<(&String, f64)> = counts
        .iter()
        .map(|(term, &tf)| (term, log_tf(tf) * idf(num_docs, document_frequency(term))))
        .collect();
    let norm = raw.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm == 0.0 {
        return QueryVector::new();
    }
    raw.into_iter()
        .filter(|(_, w)| *w != 0.0)
        .map(|(term, w)| (term.clone(), w / norm))
        .collect()
}

/// Accumulates `query weight * document weight` per document, then divides
/// by the document length. Documents of zero length score zero.
pub fn cosine_scores<'a, I>(contributions: I, lengths: &DocLengths) -> HashMap<DocId, f64>
where
    I: IntoIterator<Item = (f64, &'a [(DocId, f64)])>,
{
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for (query_weight, postings) in contributions {
        if query_weight == 0.0 {
            continue;
        }
        for &(doc_id, weight) in postings {
            *scores.entry(doc_id).or_insert(0.0) += query_weight * weight;
        }
    }
    for (doc_id, score) in scores.iter_mut() {
        match lengths.get(*doc_id) {
            Some(length) if length > 0.0 => *score /= length,
            _ => *score = 0.0,
        }
    }
    scores
}

/// Highest scores first, ties to the lower doc id. Zero scores are dropped;
/// `k == 0` keeps everything.
pub fn top_k(scores: HashMap<DocId, f64>, k: usize) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
    ranked.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
        Some(Ordering::Equal) | None => a.0.cmp(&b.0),
        Some(order) => order,
    });
    if k > 0 {
        ranked.truncate(k);
    }
    ranked
}

/// `alpha * q + beta * centroid(relevant) - gamma * centroid(rest)` over the
/// whole vocabulary. Relevant ids unknown to `lengths` are ignored and
/// negative weights are clamped to zero.
pub fn rocchio(
    query: &QueryVector,
    relevant: &BTreeSet<DocId>,
    weights: &TermWeights,
    lengths: &DocLengths,
    config: &RocchioConfig,
) -> QueryVector {
    let relevant: BTreeSet<DocId> = relevant.iter().copied().filter(|d| lengths.contains(*d)).collect();
    let relevant_count = relevant.len() as f64;
    let rest_count = lengths.num_docs() as usize - relevant.len();
    let rest_count = rest_count as f64;

    let mut refined = QueryVector::new();
    for (term, entry) in &weights.terms {
        let relevant_sum: f64 = entry
            .postings
            .iter()
            .filter(|(doc_id, _)| relevant.contains(doc_id))
            .map(|(_, w)| w)
            .sum();
        let centroid = if relevant_count > 0.0 { relevant_sum / relevant_count } else { 0.0 };
        let anti_centroid = if rest_count > 0.0 { (entry.total - relevant_sum) / rest_count } else { 0.0 };
        let original = query.get(term).copied().unwrap_or(0.0);
        let weight = config.alpha * original + config.beta * centroid - config.gamma * anti_centroid;
        if weight > 0.0 {
            refined.insert(term.clone(), weight);
        }
    }
    refined
}

/// Scores a query vector against the full-collection term weights.
pub fn score_with_weights(query: &QueryVector, weights: &TermWeights, lengths: &DocLengths) -> HashMap<DocId, f64> {
    cosine_scores(
        query
            .iter()
            .filter_map(|(term, &w)| weights.get(term).map(|entry| (w, entry.postings.as_slice()))),
        lengths,
    )
}
