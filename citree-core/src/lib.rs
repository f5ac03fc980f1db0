//! Core models shared by the citree crates.
//!
//! A [`Region`](models::Region) is a named reference sequence plus a
//! [`SplicedInterval`](models::SplicedInterval): one or more disjoint, ordered
//! [`Interval`](models::Interval) parts. Single-part regions come from plain BED
//! lines, multi-part (spliced) regions from BED12 block columns.
pub mod consts;
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::RegionError;
