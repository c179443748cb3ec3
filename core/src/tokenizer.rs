use crate::config::AnalyzerConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Text normalization used at both index and query time.
///
/// Implementations must be deterministic: the same text always yields the
/// same `(term, position)` sequence, with positions strictly increasing.
pub trait Analyzer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<(String, usize)>;

    /// Candidate synonyms of an already analyzed term.
    fn synonyms(&self, _term: &str) -> Vec<String> {
        Vec::new()
    }

    fn removes_stopwords(&self) -> bool {
        false
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into (term, position) using NFKC normalization, lowercase and stemming.
/// Every raw token occupies a position, including the ones dropped as stopwords.
pub fn tokenize_with(text: &str, remove_stopwords: bool) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if remove_stopwords && is_stopword(token) { continue; }
        let stem = STEMMER.stem(token).to_string();
        tokens.push((stem, pos));
    }
    tokens
}

pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    tokenize_with(text, false)
}

/// English analyzer with an optional thesaurus for query expansion.
#[derive(Debug, Clone, Default)]
pub struct EnglishAnalyzer {
    remove_stopwords: bool,
    thesaurus: HashMap<String, Vec<String>>,
}

impl EnglishAnalyzer {
    pub fn new() -> Self { Self::default() }

    pub fn with_stopwords(mut self, remove: bool) -> Self {
        self.remove_stopwords = remove;
        self
    }

    /// Thesaurus text: one line per head word, `word synonym synonym ...`.
    /// Heads and synonyms go through the same normalization as documents.
    pub fn with_thesaurus(mut self, text: &str) -> Self {
        for line in text.lines() {
            let mut words = line.split_whitespace();
            let Some(head) = words.next() else { continue };
            let Some((head, _)) = tokenize_with(head, false).into_iter().next() else { continue };
            let entry = self.thesaurus.entry(head.clone()).or_default();
            for word in words {
                for (syn, _) in tokenize_with(word, false) {
                    if syn != head && !entry.contains(&syn) {
                        entry.push(syn);
                    }
                }
            }
        }
        self
    }

    pub fn from_config(config: &AnalyzerConfig) -> std::io::Result<Self> {
        let mut analyzer = Self::new().with_stopwords(config.remove_stopwords);
        if let Some(path) = &config.thesaurus {
            let text = std::fs::read_to_string(path)?;
            analyzer = analyzer.with_thesaurus(&text);
            tracing::info!(path = %path.display(), heads = analyzer.thesaurus.len(), "loaded thesaurus");
        }
        Ok(analyzer)
    }
}

impl Analyzer for EnglishAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        tokenize_with(text, self.remove_stopwords)
    }

    fn synonyms(&self, term: &str) -> Vec<String> {
        self.thesaurus.get(term).cloned().unwrap_or_default()
    }

    fn removes_stopwords(&self) -> bool {
        self.remove_stopwords
    }
}
