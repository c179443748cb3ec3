use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use vsearch_core::{Analyzer, EnglishAnalyzer, IndexBuilder, IndexPaths, SearchConfig, SearchEngine};

mod batch;
mod dataset;

#[derive(Parser)]
#[command(name = "vsearch")]
#[command(about = "Build and query a blocked, positional tf-idf index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a CSV/JSON/JSONL file or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Dictionary file to write
        #[arg(short = 'd', long)]
        dictionary: PathBuf,
        /// Postings file to write
        #[arg(short = 'p', long)]
        postings: PathBuf,
        /// Pointer table; defaults to pointers.txt beside the dictionary
        #[arg(long)]
        pointers: Option<PathBuf>,
        /// Drop English stopwords while keeping the positions of the rest
        #[arg(long, default_value_t = false)]
        remove_stopwords: bool,
        /// Analyze documents on all cores
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Run every query file in a directory, writing one result line per file
    Search {
        /// Dictionary file
        #[arg(short = 'd', long)]
        dictionary: PathBuf,
        /// Postings file
        #[arg(short = 'p', long)]
        postings: PathBuf,
        /// Pointer table; defaults to pointers.txt beside the dictionary
        #[arg(long)]
        pointers: Option<PathBuf>,
        /// Directory of query files
        #[arg(short = 'q', long)]
        queries: PathBuf,
        /// Results file
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// JSON search configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Documents kept per ranking pass (0 keeps all)
        #[arg(long)]
        top_k: Option<usize>,
        /// Skip Rocchio feedback
        #[arg(long, default_value_t = false)]
        no_feedback: bool,
        /// Thesaurus file; enables synonym expansion
        #[arg(long)]
        thesaurus: Option<PathBuf>,
        /// Worker threads for the full-index scan (0 = one per core)
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, dictionary, postings, pointers, remove_stopwords, parallel } => {
            let paths = index_paths(&dictionary, &postings, pointers.as_deref());
            build_index(&input, &paths, remove_stopwords, parallel)
        }
        Commands::Search {
            dictionary,
            postings,
            pointers,
            queries,
            output,
            config,
            top_k,
            no_feedback,
            thesaurus,
            workers,
        } => {
            let mut config = match config {
                Some(path) => SearchConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
                None => SearchConfig::default(),
            };
            if let Some(k) = top_k {
                config.top_k = k;
            }
            if no_feedback {
                config.feedback.enabled = false;
            }
            if let Some(path) = thesaurus {
                config.analyzer.thesaurus = Some(path);
                config.expand_synonyms = true;
            }
            if let Some(n) = workers {
                config.workers = n;
            }
            let paths = index_paths(&dictionary, &postings, pointers.as_deref());
            search_queries(paths, config, &queries, &output)
        }
    }
}

fn index_paths(dictionary: &Path, postings: &Path, pointers: Option<&Path>) -> IndexPaths {
    let paths = IndexPaths::from_files(dictionary, postings);
    match pointers {
        Some(p) => paths.with_pointers(p),
        None => paths,
    }
}

fn build_index(input: &Path, paths: &IndexPaths, remove_stopwords: bool, parallel: bool) -> Result<()> {
    let start = std::time::Instant::now();
    let docs = dataset::load(input)?;
    tracing::info!(docs = docs.len(), "ingested documents");

    let analyzer: Arc<dyn Analyzer> = Arc::new(EnglishAnalyzer::new().with_stopwords(remove_stopwords));
    let mut builder = IndexBuilder::new(analyzer).parallel(parallel);
    for doc in &docs {
        builder.add_document(doc.id, &doc.text);
    }
    let built = builder.finish()?;
    built.write(paths)?;

    tracing::info!(
        num_docs = built.manifest.num_docs,
        num_terms = built.manifest.num_terms,
        took_s = start.elapsed().as_secs_f64(),
        dictionary = %paths.dictionary.display(),
        "index build complete"
    );
    Ok(())
}

fn search_queries(paths: IndexPaths, config: SearchConfig, queries: &Path, output: &Path) -> Result<()> {
    let engine = SearchEngine::open(paths, config).context("opening index")?;
    let queries = batch::read_queries(queries)?;
    let hits = batch::run(&engine, &queries, output)?;
    tracing::info!(queries = queries.len(), hits, output = %output.display(), "search complete");
    Ok(())
}
