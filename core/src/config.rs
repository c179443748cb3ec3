use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocchioConfig {
    pub enabled: bool,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for RocchioConfig {
    fn default() -> Self {
        Self { enabled: true, alpha: 1.0, beta: 0.70, gamma: 0.05 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub remove_stopwords: bool,
    /// Thesaurus file used for query-time synonym expansion.
    pub thesaurus: Option<PathBuf>,
}

/// Query-time settings, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Documents kept from each ranking pass; 0 keeps every scored document.
    pub top_k: usize,
    pub feedback: RocchioConfig,
    pub expand_synonyms: bool,
    /// Worker threads for the full-index scan; 0 lets rayon decide.
    pub workers: usize,
    pub analyzer: AnalyzerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            feedback: RocchioConfig::default(),
            expand_synonyms: false,
            workers: 0,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"top_k": 25, "feedback": {"beta": 0.5}}"#).unwrap();
        assert_eq!(config.top_k, 25);
        assert_eq!(config.feedback.beta, 0.5);
        assert_eq!(config.feedback.alpha, 1.0);
        assert!(config.feedback.enabled);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }
}
