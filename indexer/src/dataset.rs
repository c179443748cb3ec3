use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use vsearch_core::DocId;
use walkdir::WalkDir;

/// A document ready for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(DocId),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(alias = "document_id")]
    id: RawId,
    #[serde(alias = "content")]
    body: String,
}

impl InputDoc {
    fn into_document(self) -> Result<Document> {
        let id = match self.id {
            RawId::Number(id) => id,
            RawId::Text(text) => parse_id(&text)?,
        };
        Ok(Document { id, text: self.body })
    }
}

fn parse_id(text: &str) -> Result<DocId> {
    text.trim()
        .parse()
        .with_context(|| format!("document id {text:?} is not an unsigned integer"))
}

/// Dataset files under `input`: the file itself, or every csv/json/jsonl
/// file below a directory, sorted by path.
pub fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "csv" | "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

pub fn load(input: &Path) -> Result<Vec<Document>> {
    let files = collect_files(input);
    if files.is_empty() {
        anyhow::bail!("no dataset files found at {}", input.display());
    }
    let mut docs = Vec::new();
    for file in files {
        let before = docs.len();
        match file.extension().and_then(|s| s.to_str()) {
            Some("csv") => read_csv(&file, &mut docs)?,
            Some("jsonl") => read_jsonl(&file, &mut docs)?,
            _ => read_json(&file, &mut docs)?,
        }
        tracing::info!(file = %file.display(), docs = docs.len() - before, "read dataset file");
    }
    Ok(docs)
}

/// CSV with a header row. The id and text columns are `document_id` and
/// `content` when named, otherwise the first and third columns.
fn read_csv(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file)
        .with_context(|| format!("opening {}", file.display()))?;
    let headers = reader.headers()?.clone();
    let id_col = headers.iter().position(|h| h.trim() == "document_id").unwrap_or(0);
    let text_col = headers.iter().position(|h| h.trim() == "content").unwrap_or(2);
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{}: row {}", file.display(), row + 2))?;
        let id = parse_id(record.get(id_col).unwrap_or_default())
            .with_context(|| format!("{}: row {}", file.display(), row + 2))?;
        let text = record.get(text_col).unwrap_or_default().to_string();
        docs.push(Document { id, text });
    }
    Ok(())
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}: line {}", file.display(), n + 1))?;
        docs.push(doc.into_document()?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                docs.push(doc.into_document()?);
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            docs.push(doc.into_document()?);
        }
        _ => tracing::warn!(file = %file.display(), "ignoring json that is neither an object nor an array"),
    }
    Ok(())
}
