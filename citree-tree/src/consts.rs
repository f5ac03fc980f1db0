/// Magic marker of trees whose Data section holds the records.
pub const INTERNAL_MAGIC: [u8; 4] = *b"CTI1";
/// Magic marker of trees whose pointers refer to caller-managed payloads.
pub const EXTERNAL_MAGIC: [u8; 4] = *b"CTX1";

/// magic + nodeCount + intervalCount + max + listsOffset + dataOffset
pub const HEADER_SIZE: u64 = 32;
/// Position of listsOffset inside the header; dataOffset follows it.
pub const SECTION_OFFSETS_POS: u64 = 16;
/// coordinate (u32) + list offset (u64)
pub const NODE_SIZE: u64 = 12;

/// Largest boundary a region may carry: half the positive range of a 32-bit signed coordinate.
pub const MAX_BOUNDARY: u32 = 1 << 30;

/// Interval-parts held in memory before a builder spills to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 4_000_000;

pub const CONTAINER_MAGIC: [u8; 4] = *b"CTMC";
pub const CONTAINER_VERSION: u32 = 1;
/// magic + version + directoryOffset + metadataOffset + metadataLength
pub const CONTAINER_HEADER_SIZE: u64 = 32;

/// How many adds a container accepts between two idle checks.
pub const IDLE_CHECK_INTERVAL: usize = 4096;
