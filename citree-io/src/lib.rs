//! # Input/Output utilities for citree.
//!
//! This small crate provides the byte-level plumbing the interval tree is built on:
//! a shared, memory-mapped [`ByteStore`] with bounded [`ByteView`]s and independent
//! cursors, a LEB128 [`varint`] codec, and helpers for reading and writing BED files.
//!
pub mod bed;
pub mod error;
pub mod store;
pub mod varint;

// re-expose core functions
pub use bed::*;
pub use error::*;
pub use store::*;
