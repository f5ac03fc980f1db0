use std::io;
use thiserror::Error;

use citree_core::RegionError;

/// Error type for citree-io operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error occurred during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A read or sub-view reached past the end of the view.
    #[error("Read of {len} bytes at position {pos} is out of bounds for a view of {size} bytes")]
    OutOfBounds { pos: u64, len: u64, size: u64 },

    /// A varint ran past the end of the data.
    #[error("Truncated varint at position {0}")]
    TruncatedVarint(u64),

    /// A varint does not fit in 64 bits.
    #[error("Varint overflow at position {0}")]
    VarintOverflow(u64),

    /// A BED line could not be turned into a region.
    #[error("Line {line}: {source}")]
    BedLine {
        line: usize,
        #[source]
        source: RegionError,
    },

    /// Bytes expected to be ASCII text were not.
    #[error("Non-ASCII text at position {0}")]
    InvalidText(u64),
}

impl From<StoreError> for io::Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Io(e) => e,
            StoreError::OutOfBounds { .. } | StoreError::TruncatedVarint(_) => {
                io::Error::new(io::ErrorKind::UnexpectedEof, value)
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type alias for citree-io operations.
pub type Result<T> = std::result::Result<T, StoreError>;
