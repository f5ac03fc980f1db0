//! Disk-resident centered interval trees for genomic regions.
//!
//! This crate builds and queries interval trees that live in a single contiguous byte
//! range, so they can be memory-mapped and queried without ever being loaded. Regions
//! may be spliced: a transcript with several exons is one region with several parts,
//! and a query matches it when any exon overlaps.
//!
//! ## Features
//!
//! - **Bounded-memory builds**: node lists spill to a temporary file once a configurable
//!   number of parts is buffered, and are merged back when the tree is written
//! - **Implicit tree shape**: node coordinates are derived from a power-of-two bound, so
//!   only non-empty nodes are stored and lookups are binary searches over a flat table
//! - **Two payload modes**: trees either store records themselves, encoded with a
//!   [`PayloadCodec`], or index caller-managed pointers
//! - **Thread-safe readers**: any number of threads can query one memory map; each tree
//!   header is parsed once, on first use
//! - **Multi-sequence containers**: [`MultiTreeBuilder`] and [`MultiTreeReader`] keep one
//!   tree per reference sequence in a single file
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use citree_core::models::SplicedInterval;
//! use citree_io::ByteStore;
//! use citree_tree::{BuilderConfig, IntervalTree, StringCodec, TreeBuilder};
//!
//! let mut builder = TreeBuilder::new(StringCodec, BuilderConfig::default()).unwrap();
//! builder.add(&SplicedInterval::single(10, 20).unwrap(), &"A".to_string()).unwrap();
//! builder.add(&SplicedInterval::single(15, 25).unwrap(), &"B".to_string()).unwrap();
//! builder.add(&SplicedInterval::single(100, 110).unwrap(), &"C".to_string()).unwrap();
//!
//! let mut out = Cursor::new(Vec::new());
//! builder.build(&mut out).unwrap();
//!
//! let store = ByteStore::from_vec(out.into_inner());
//! let tree = IntervalTree::new(store.full_view(), StringCodec);
//!
//! let hits: Vec<String> = tree
//!     .overlapping(18, 22)
//!     .unwrap()
//!     .into_iter()
//!     .map(|record| record.payload)
//!     .collect();
//! assert_eq!(hits, vec!["A", "B"]);
//! ```
//!
//! ## Tree layout
//!
//! A tree is a 32-byte header (magic, node count, region count, `max`, and the offsets of
//! the Lists and Data sections), a table of `(coordinate, list offset)` node entries sorted
//! by coordinate, the node lists themselves, and for internal trees the records. All
//! integers in fixed-width fields are little-endian; everything else is LEB128.
pub mod builder;
pub mod codec;
pub mod consts;
pub mod container;
pub mod coordinate;
pub mod entry;
pub mod errors;
pub mod reader;
pub mod record;

// re-exports
pub use self::builder::{BuilderConfig, ExternalTreeBuilder, TreeBuilder, TreeStats};
pub use self::codec::{BincodeCodec, GzipCodec, PayloadCodec, StringCodec, UnitCodec};
pub use self::container::{
    ContainerConfig, ContainerMetadata, ContainerStats, MultiTreeBuilder, MultiTreeReader,
    TreeEntry, read_metadata,
};
pub use self::errors::{Result, TreeError};
pub use self::reader::{IntervalTree, PayloadMode, Record, RecordIter, TreeHeader, TreeReader};
