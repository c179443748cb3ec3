use std::sync::Arc;
use tempfile::TempDir;
use vsearch_core::{
    Analyzer, DocId, EnglishAnalyzer, IndexBuilder, IndexHandle, IndexPaths, QueryMode, RocchioConfig, SearchConfig,
    SearchEngine,
};

fn engine_with(docs: &[(DocId, &str)], analyzer: EnglishAnalyzer, config: SearchConfig) -> (TempDir, SearchEngine) {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let analyzer: Arc<dyn Analyzer> = Arc::new(analyzer);
    IndexBuilder::build(Arc::clone(&analyzer), docs.iter().copied()).unwrap().write(&paths).unwrap();
    let handle = Arc::new(IndexHandle::open(paths, 2).unwrap());
    (dir, SearchEngine::new(handle, analyzer, config))
}

fn engine(docs: &[(DocId, &str)], config: SearchConfig) -> (TempDir, SearchEngine) {
    engine_with(docs, EnglishAnalyzer::new(), config)
}

fn no_feedback(top_k: usize) -> SearchConfig {
    SearchConfig {
        top_k,
        feedback: RocchioConfig { enabled: false, ..RocchioConfig::default() },
        ..SearchConfig::default()
    }
}

#[test]
fn boolean_and_intersects_all_operands() {
    let docs = [(1, "alpha"), (3, "alpha beta"), (5, "alpha beta gamma"), (7, "alpha"), (9, "beta")];
    let (_dir, engine) = engine(&docs, SearchConfig::default());
    let outcome = engine.search("alpha AND beta AND gamma", &[]).unwrap();
    assert_eq!(outcome.mode, QueryMode::Boolean);
    assert_eq!(outcome.doc_ids(), vec![5]);
    assert!(outcome.hits.iter().all(|h| h.score.is_none()));

    assert_eq!(engine.search("alpha AND beta", &[]).unwrap().doc_ids(), vec![3, 5]);
    assert!(engine.search("alpha AND omega", &[]).unwrap().hits.is_empty());
}

#[test]
fn boolean_operands_may_be_phrases() {
    let docs = [
        (1, "the quick brown fox"),
        (2, "a brown quick fox"),
        (3, "quick brown dogs only"),
    ];
    let (_dir, engine) = engine(&docs, SearchConfig::default());
    assert_eq!(engine.search("\"quick brown\" AND fox", &[]).unwrap().doc_ids(), vec![1]);
    assert_eq!(engine.search("\"quick brown\" AND quick", &[]).unwrap().doc_ids(), vec![1, 3]);
}

#[test]
fn phrase_requires_order_and_adjacency() {
    let docs = [(1, "the quick brown fox"), (2, "red apple tasty apple pie")];
    let (_dir, engine) = engine(&docs, SearchConfig::default());
    assert_eq!(engine.phrase("quick brown").unwrap(), vec![1]);
    assert!(engine.phrase("brown quick").unwrap().is_empty());
    assert_eq!(engine.phrase("The Quick Brown Fox").unwrap(), vec![1]);
    // each pair is adjacent somewhere, but never as one run
    assert!(engine.phrase("red apple pie").unwrap().is_empty());
    assert_eq!(engine.phrase("tasty apple pie").unwrap(), vec![2]);
    assert!(engine.phrase("purple apple").unwrap().is_empty());
}

#[test]
fn phrase_spans_removed_stopwords() {
    let docs = [(1, "united states of america"), (2, "united states america")];
    let (_dir, engine) = engine_with(&docs, EnglishAnalyzer::new().with_stopwords(true), SearchConfig::default());
    assert_eq!(engine.phrase("states of america").unwrap(), vec![1]);
    assert_eq!(engine.phrase("states america").unwrap(), vec![2]);
}

#[test]
fn shorter_document_ranks_at_least_as_high() {
    let docs = [(1, "apple banana"), (2, "apple apple apple banana"), (3, "cherry")];
    let (_dir, engine) = engine(&docs, no_feedback(10));
    let outcome = engine.search("apple banana", &[]).unwrap();
    assert_eq!(outcome.mode, QueryMode::Ranked);
    assert_eq!(outcome.doc_ids(), vec![1, 2]);
    let scores: Vec<f64> = outcome.hits.iter().filter_map(|h| h.score).collect();
    assert!((scores[0] - 1.0).abs() < 1e-9);
    assert!(scores[0] >= scores[1]);
}

#[test]
fn unseen_terms_score_nothing() {
    let docs = [(1, "apple"), (2, "banana")];
    let (_dir, engine) = engine(&docs, SearchConfig::default());
    assert!(engine.search("durian", &[]).unwrap().hits.is_empty());
    assert!(engine.search("", &[]).unwrap().hits.is_empty());
}

const FEEDBACK_DOCS: &[(DocId, &str)] = &[
    (1, "rust borrow checker rust"),
    (2, "rust garbage"),
    (3, "python garbage collector"),
    (4, "java garbage collector"),
];

#[test]
fn feedback_keeps_top_document_on_top() {
    let (_dir, plain) = engine(FEEDBACK_DOCS, no_feedback(2));
    let before = plain.search("rust borrow", &[]).unwrap().doc_ids();
    assert_eq!(before, vec![1, 2]);

    let config = SearchConfig { top_k: 2, ..SearchConfig::default() };
    let (_dir, refined) = engine(FEEDBACK_DOCS, config);
    let after = refined.search("rust borrow", &[]).unwrap().doc_ids();
    assert_eq!(after[0], before[0]);
    assert!(after.contains(&2));
}

#[test]
fn known_relevant_documents_join_feedback() {
    let config = SearchConfig { top_k: 0, ..SearchConfig::default() };
    let (_dir, engine) = engine(FEEDBACK_DOCS, config);

    let ranked = engine.ranked("rust borrow", &[]).unwrap();
    let score = |ranked: &[(DocId, f64)], doc: DocId| ranked.iter().find(|(d, _)| *d == doc).map(|(_, s)| *s);
    assert_eq!(score(&ranked, 3), score(&ranked, 4));

    let ranked = engine.ranked("rust borrow", &[3]).unwrap();
    assert_eq!(ranked[0].0, 1);
    assert!(score(&ranked, 3).unwrap() > score(&ranked, 4).unwrap());
}

#[test]
fn synonyms_expand_ranked_queries() {
    let docs = [(1, "automobile repair"), (2, "bicycle repair"), (3, "train")];
    let analyzer = || EnglishAnalyzer::new().with_thesaurus("car automobile\n");

    let (_dir, plain) = engine_with(&docs, analyzer(), no_feedback(10));
    assert!(plain.search("car", &[]).unwrap().hits.is_empty());

    let config = SearchConfig { expand_synonyms: true, ..no_feedback(10) };
    let (_dir, expanded) = engine_with(&docs, analyzer(), config);
    assert_eq!(expanded.search("car", &[]).unwrap().doc_ids(), vec![1]);
}

#[test]
fn concurrent_queries_share_one_handle() {
    let docs: Vec<(DocId, String)> = (0..40)
        .map(|i| (i, format!("doc {} shared term{} common words {}", i, i % 7, if i % 2 == 0 { "even" } else { "odd" })))
        .collect();
    let borrowed: Vec<(DocId, &str)> = docs.iter().map(|(i, t)| (*i, t.as_str())).collect();
    let (_dir, engine) = engine(&borrowed, SearchConfig::default());
    let engine = Arc::new(engine);
    let expected = engine.search("even common", &[]).unwrap();
    let boolean = engine.search("shared AND odd", &[]).unwrap();
    assert_eq!(boolean.hits.len(), 20);

    std::thread::scope(|s| {
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            let expected = &expected;
            let boolean = &boolean;
            s.spawn(move || {
                for _ in 0..5 {
                    assert_eq!(&engine.search("even common", &[]).unwrap(), expected);
                    assert_eq!(&engine.search("shared AND odd", &[]).unwrap(), boolean);
                }
            });
        }
    });
}

#[test]
fn open_follows_the_indexed_stopword_setting() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let docs = [(1, "united states of america"), (2, "states america")];
    let analyzer: Arc<dyn Analyzer> = Arc::new(EnglishAnalyzer::new().with_stopwords(true));
    IndexBuilder::build(analyzer, docs.iter().copied()).unwrap().write(&paths).unwrap();

    let engine = SearchEngine::open(paths, SearchConfig::default()).unwrap();
    assert!(engine.config().analyzer.remove_stopwords);
    assert_eq!(engine.phrase("states of america").unwrap(), vec![1]);
}

#[test]
fn per_query_k_overrides_the_configured_one() {
    let docs: Vec<(DocId, String)> = (1..=15).map(|i| (i, format!("rust crate number{i}"))).collect();
    let mut borrowed: Vec<(DocId, &str)> = docs.iter().map(|(i, t)| (*i, t.as_str())).collect();
    borrowed.push((16, "gardening"));
    let (_dir, engine) = engine(&borrowed, no_feedback(10));

    let capped = engine.search("rust", &[]).unwrap();
    assert_eq!(capped.hits.len(), 10);
    assert_eq!(capped.total_hits, 15);

    let wide = engine.search_with("rust", &[], 15).unwrap();
    assert_eq!(wide.hits.len(), 15);
    assert_eq!(wide.total_hits, 15);
    assert_eq!(engine.search_with("rust", &[], 3).unwrap().hits.len(), 3);
}

/// Spreads query words 2^32 slots apart.
struct Sparse;

impl Analyzer for Sparse {
    fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        text.split_whitespace().enumerate().map(|(i, w)| (w.to_lowercase(), i << 32)).collect()
    }
}

#[test]
fn phrase_offsets_past_u32_are_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let docs = [(1, "the quick brown fox")];
    IndexBuilder::build(Arc::new(EnglishAnalyzer::new()), docs.iter().copied()).unwrap().write(&paths).unwrap();
    let handle = Arc::new(IndexHandle::open(paths, 1).unwrap());
    let engine = SearchEngine::new(handle, Arc::new(Sparse), SearchConfig::default());
    let err = engine.phrase("quick brown").unwrap_err();
    assert!(matches!(err, vsearch_core::IndexError::PositionOverflow(_)));
}
