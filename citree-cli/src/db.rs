//! Opening containers written by `citree build`.

use std::path::Path;

use anyhow::{Context, Result};

use citree_core::models::Region;
use citree_tree::{GzipCodec, MultiTreeReader, Record, StringCodec, read_metadata};

/// Payloads are the BED columns after the coordinates, stored as text.
pub type PlainReader = MultiTreeReader<StringCodec>;
pub type CompressedReader = MultiTreeReader<GzipCodec<StringCodec>>;

pub enum Database {
    Plain(PlainReader),
    Compressed(CompressedReader),
}

impl Database {
    ///
    /// Open a container, picking the codec its metadata asks for.
    ///
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = read_metadata(path)
            .with_context(|| format!("Failed to read citree container: {}", path.display()))?;

        let db = if metadata.compressed {
            Database::Compressed(MultiTreeReader::open(path, GzipCodec::new(StringCodec))?)
        } else {
            Database::Plain(MultiTreeReader::open(path, StringCodec)?)
        };
        Ok(db)
    }
}

/// Turn a stored record back into its BED line.
pub fn record_to_bed(chr: &str, record: Record<String>) -> String {
    Region {
        chr: chr.to_string(),
        interval: record.interval,
        rest: Some(record.payload).filter(|s| !s.is_empty()),
    }
    .as_string()
}
