use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use vsearch_core::{DocId, SearchEngine};

/// One query file: the query on the first line, then known-relevant doc ids.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFile {
    pub name: String,
    pub query: String,
    pub relevant: Vec<DocId>,
}

impl QueryFile {
    pub fn parse(name: &str, contents: &str) -> Self {
        let mut lines = contents.lines();
        let query = lines.next().unwrap_or_default().trim().to_string();
        let mut relevant = Vec::new();
        for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
            match line.parse() {
                Ok(doc_id) => relevant.push(doc_id),
                Err(_) => tracing::warn!(file = name, line, "skipping relevant doc id that is not an integer"),
            }
        }
        Self { name: name.to_string(), query, relevant }
    }
}

/// Every regular file in `dir`, ordered by file name.
pub fn read_queries(dir: &Path) -> Result<Vec<QueryFile>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading queries from {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.path());
        }
    }
    entries.sort();
    let mut queries = Vec::with_capacity(entries.len());
    for path in entries {
        let contents = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        queries.push(QueryFile::parse(&name, &contents));
    }
    Ok(queries)
}

/// Runs each query and writes its doc ids, space separated, one line per
/// query in the same order.
pub fn run(engine: &SearchEngine, queries: &[QueryFile], output: &Path) -> Result<usize> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(fs::File::create(output).with_context(|| format!("creating {}", output.display()))?);
    let mut total = 0;
    for query in queries {
        let start = std::time::Instant::now();
        let outcome = engine
            .search(&query.query, &query.relevant)
            .with_context(|| format!("query {}", query.name))?;
        let ids: Vec<String> = outcome.hits.iter().map(|h| h.doc_id.to_string()).collect();
        writeln!(out, "{}", ids.join(" "))?;
        total += ids.len();
        tracing::info!(
            file = %query.name,
            mode = ?outcome.mode,
            hits = ids.len(),
            took_s = start.elapsed().as_secs_f64(),
            "query done"
        );
    }
    out.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vsearch_core::{Analyzer, EnglishAnalyzer, IndexBuilder, IndexPaths, SearchConfig};

    #[test]
    fn parses_query_and_relevant_ids() {
        let q = QueryFile::parse("q1.txt", "quiet phone call\n246391\n\n  10 \nnope\n");
        assert_eq!(q.query, "quiet phone call");
        assert_eq!(q.relevant, vec![246391, 10]);
        assert_eq!(QueryFile::parse("empty", "").query, "");
    }

    #[test]
    fn writes_one_line_per_query_file_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index");
        let paths = IndexPaths::new(&index);
        let analyzer: Arc<dyn Analyzer> = Arc::new(EnglishAnalyzer::new());
        let docs = [(1, "quiet phone call"), (2, "loud phone"), (3, "garden fence")];
        IndexBuilder::build(analyzer, docs.iter().copied()).unwrap().write(&paths).unwrap();

        let queries_dir = dir.path().join("queries");
        fs::create_dir_all(queries_dir.join("nested")).unwrap();
        fs::write(queries_dir.join("b.txt"), "phone AND quiet\n").unwrap();
        fs::write(queries_dir.join("a.txt"), "garden\n3\n").unwrap();
        fs::write(queries_dir.join("c.txt"), "spaceship\n").unwrap();

        let queries = read_queries(&queries_dir).unwrap();
        assert_eq!(queries.iter().map(|q| q.name.as_str()).collect::<Vec<_>>(), vec!["a.txt", "b.txt", "c.txt"]);

        let engine = SearchEngine::open(paths, SearchConfig::default()).unwrap();
        let output = dir.path().join("out/results.txt");
        let total = run(&engine, &queries, &output).unwrap();
        assert_eq!(total, 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "3\n1\n\n");
    }
}
