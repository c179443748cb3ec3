use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use vsearch_core::tokenizer::tokenize;
use vsearch_core::{EnglishAnalyzer, IndexBuilder, IndexHandle, IndexPaths, SearchConfig, SearchEngine};

const TEXT: &str = "The court held that the defendant's negligence caused the plaintiff's injuries, \
    and that damages for pain and suffering were recoverable under the statute.";

fn corpus() -> Vec<(u32, String)> {
    (0..500)
        .map(|i| (i, format!("{TEXT} case {} clause {} section {}", i, i % 37, i % 11)))
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(TEXT)));
}

fn bench_lookup(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = IndexPaths::new(dir.path());
    let analyzer = Arc::new(EnglishAnalyzer::new());
    IndexBuilder::build(analyzer.clone(), corpus())
        .expect("build index")
        .write(&paths)
        .expect("write index");
    let handle = Arc::new(IndexHandle::open(paths, 0).expect("open index"));

    c.bench_function("locate_and_decode", |b| {
        let mut reader = handle.reader().expect("reader");
        b.iter(|| reader.postings("damag").expect("postings"))
    });

    let engine = SearchEngine::new(handle.clone(), analyzer, SearchConfig::default());
    c.bench_function("ranked_with_feedback", |b| {
        b.iter(|| engine.search("negligence damages statute", &[]).expect("search"))
    });
}

criterion_group!(benches, bench_tokenize, bench_lookup);
criterion_main!(benches);
