use crate::codec::CodecError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, opening or querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing index file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("corrupt {file} at byte {offset}: {source}")]
    Corrupt {
        file: &'static str,
        offset: u64,
        #[source]
        source: CodecError,
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("incompatible index: {0}")]
    Incompatible(String),

    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("token position {0} does not fit in 32 bits")]
    PositionOverflow(usize),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn corrupt(file: &'static str, offset: u64, source: CodecError) -> Self {
        IndexError::Corrupt { file, offset, source }
    }
}

/// Narrows an analyzer position to the stored width.
pub(crate) fn position(pos: usize) -> Result<u32> {
    u32::try_from(pos).map_err(|_| IndexError::PositionOverflow(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_error_names_file_and_offset() {
        let err = IndexError::corrupt("postings", 42, CodecError::Empty);
        assert_eq!(err.to_string(), "corrupt postings at byte 42: empty record");
    }

    #[test]
    fn positions_past_u32_are_rejected() {
        assert_eq!(position(7).unwrap(), 7);
        assert_eq!(position(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(position(u32::MAX as usize + 1), Err(IndexError::PositionOverflow(_))));
    }

    #[test]
    fn missing_file_display() {
        let err = IndexError::MissingFile(PathBuf::from("idx/pointers.txt"));
        assert_eq!(err.to_string(), "missing index file: idx/pointers.txt");
    }
}
