use thiserror::Error;

use citree_core::RegionError;
use citree_io::StoreError;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("Not a citree file: unexpected magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt record at data offset {pointer}: {reason}")]
    CorruptRecord { pointer: u64, reason: String },

    #[error("Boundary {value} exceeds the largest supported coordinate {limit}")]
    BoundaryOutOfRange { value: u32, limit: u32 },

    #[error("Reference sequence name {0:?} is not ASCII")]
    InvalidName(String),

    #[error("Invalid query: start {start} is after end {end}")]
    InvalidQuery { start: u32, end: u32 },

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Tree does not manage payloads: it was built with external pointers")]
    PayloadNotManaged,

    #[error("Unsupported container version {0}")]
    UnsupportedVersion(u32),

    #[error("Payload type mismatch: container holds {found}, codec expects {expected}")]
    PayloadTypeMismatch { found: String, expected: String },

    #[error("Invalid container metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreeError>;
