pub mod builder;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod index;
pub mod persist;
pub mod query;
pub mod ranking;
pub mod tokenizer;

pub use builder::{BuiltIndex, IndexBuilder};
pub use config::{AnalyzerConfig, RocchioConfig, SearchConfig};
pub use engine::{Hit, QueryMode, SearchEngine, SearchOutcome};
pub use error::{IndexError, Result};
pub use handle::{IndexHandle, IndexReader, TermWeights};
pub use index::{DocId, DocLengths, PointerRecord, Posting, PostingsList, PostingsRecord, BLOCK_SIZE};
pub use persist::{IndexPaths, Manifest};
pub use query::{Operand, Query};
pub use tokenizer::{Analyzer, EnglishAnalyzer};
