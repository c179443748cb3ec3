use crate::codec;
use crate::error::{IndexError, Result};
use crate::index::{DocId, DocLengths, PointerRecord};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// Build summary written next to the artifacts. Carries no timestamps so a
/// rebuild from the same input is byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub block_size: usize,
    pub num_docs: u32,
    pub num_terms: usize,
    pub remove_stopwords: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexPaths {
    pub dictionary: PathBuf,
    pub postings: PathBuf,
    pub pointers: PathBuf,
    pub doc_lengths: PathBuf,
    pub all_doc_ids: PathBuf,
    pub manifest: PathBuf,
}

impl IndexPaths {
    /// Default file names inside one directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self::from_files(root.join("dictionary.txt"), root.join("postings.txt"))
    }

    /// Explicit dictionary and postings files; the remaining artifacts live
    /// beside the dictionary.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(dictionary: P, postings: Q) -> Self {
        let dictionary = dictionary.as_ref().to_path_buf();
        let dir = dictionary.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            postings: postings.as_ref().to_path_buf(),
            pointers: dir.join("pointers.txt"),
            doc_lengths: dir.join("document.txt"),
            all_doc_ids: dir.join("all_doc_ids.txt"),
            manifest: dir.join("meta.json"),
            dictionary,
        }
    }

    pub fn with_pointers<P: AsRef<Path>>(mut self, pointers: P) -> Self {
        self.pointers = pointers.as_ref().to_path_buf();
        self
    }

    /// Files a reader cannot work without.
    pub fn required(&self) -> [&Path; 5] {
        [
            self.dictionary.as_path(),
            self.postings.as_path(),
            self.pointers.as_path(),
            self.doc_lengths.as_path(),
            self.all_doc_ids.as_path(),
        ]
    }

    pub(crate) fn create_dirs(&self) -> Result<()> {
        for path in self.required().into_iter().chain([self.manifest.as_path()]) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(content.as_bytes())?;
    f.flush()?;
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    let mut f = File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => IndexError::MissingFile(path.to_path_buf()),
        _ => IndexError::Io(err),
    })?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(buf)
}

pub fn load_pointers(paths: &IndexPaths) -> Result<Vec<PointerRecord>> {
    let text = read_file(&paths.pointers)?;
    codec::decode_pointers(&text).map_err(|e| IndexError::corrupt("pointers", 0, e))
}

pub fn load_doc_lengths(paths: &IndexPaths) -> Result<DocLengths> {
    let text = read_file(&paths.doc_lengths)?;
    codec::decode_doc_lengths(&text).map_err(|e| IndexError::corrupt("document lengths", 0, e))
}

pub fn load_doc_ids(paths: &IndexPaths) -> Result<Vec<DocId>> {
    let text = read_file(&paths.all_doc_ids)?;
    codec::decode_doc_ids(&text).map_err(|e| IndexError::corrupt("doc ids", 0, e))
}

pub fn save_manifest(paths: &IndexPaths, manifest: &Manifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    write_file(&paths.manifest, &json)
}

/// The manifest is optional; indexes written by hand or by older builds lack it.
pub fn load_manifest(paths: &IndexPaths) -> Result<Option<Manifest>> {
    if !paths.manifest.exists() {
        return Ok(None);
    }
    let text = read_file(&paths.manifest)?;
    Ok(Some(serde_json::from_str(&text)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siblings_follow_dictionary() {
        let paths = IndexPaths::from_files("out/dict.txt", "elsewhere/post.txt");
        assert_eq!(paths.postings, PathBuf::from("elsewhere/post.txt"));
        assert_eq!(paths.pointers, PathBuf::from("out/pointers.txt"));
        assert_eq!(paths.doc_lengths, PathBuf::from("out/document.txt"));
        let paths = paths.with_pointers("p.txt");
        assert_eq!(paths.pointers, PathBuf::from("p.txt"));
    }

    #[test]
    fn bare_file_names_stay_relative() {
        let paths = IndexPaths::from_files("dictionary.txt", "postings.txt");
        assert_eq!(paths.all_doc_ids, PathBuf::from("all_doc_ids.txt"));
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        match load_pointers(&paths) {
            Err(IndexError::MissingFile(p)) => assert_eq!(p, paths.pointers),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(load_manifest(&paths).unwrap(), None);
    }
}
