//! Records of the Data section.
//!
//! A record is the number of parts, the first boundary, the `2p - 1` deltas of every
//! following boundary from the one before it, and finally the codec's payload bytes.

use std::io;

use citree_core::models::SplicedInterval;
use citree_io::ViewCursor;
use citree_io::varint::encode_varint;

use crate::codec::PayloadCodec;
use crate::errors::{Result, TreeError};

/// Append the boundary block of `interval` to `buf`.
pub fn encode_boundaries(interval: &SplicedInterval, buf: &mut Vec<u8>) {
    encode_varint(interval.num_parts() as u64, buf);
    let mut previous = 0;
    for (i, boundary) in interval.boundaries().enumerate() {
        let value = if i == 0 { boundary } else { boundary - previous };
        encode_varint(value as u64, buf);
        previous = boundary;
    }
}

///
/// Append a full record (boundaries, then payload) to `buf`.
///
pub fn encode_record<C: PayloadCodec>(
    interval: &SplicedInterval,
    payload: &C::Value,
    codec: &C,
    buf: &mut Vec<u8>,
) -> io::Result<()> {
    encode_boundaries(interval, buf);
    codec.encode(payload, buf)
}

pub fn decode_boundaries(cursor: &mut ViewCursor<'_>) -> Result<SplicedInterval> {
    let pointer = cursor.position();
    let corrupt = |reason: String| TreeError::CorruptRecord { pointer, reason };

    let num_parts = cursor.read_varint()?;
    // every boundary takes at least one byte
    if num_parts == 0 || num_parts.saturating_mul(2) > cursor.remaining() {
        return Err(corrupt(format!("implausible part count {num_parts}")));
    }

    let mut boundaries = Vec::with_capacity(num_parts as usize * 2);
    let mut previous: u32 = 0;
    for i in 0..num_parts * 2 {
        let value = u32::try_from(cursor.read_varint()?)
            .map_err(|_| corrupt("boundary does not fit in 32 bits".to_string()))?;
        let boundary = if i == 0 {
            value
        } else {
            previous
                .checked_add(value)
                .ok_or_else(|| corrupt("boundary overflow".to_string()))?
        };
        boundaries.push(boundary);
        previous = boundary;
    }

    SplicedInterval::from_boundaries(&boundaries).map_err(|e| corrupt(e.to_string()))
}

pub fn decode_record<C: PayloadCodec>(
    cursor: &mut ViewCursor<'_>,
    codec: &C,
) -> Result<(SplicedInterval, C::Value)> {
    let pointer = cursor.position();
    let interval = decode_boundaries(cursor)?;
    let payload = codec
        .decode(cursor)
        .map_err(|e| TreeError::CorruptRecord {
            pointer,
            reason: format!("payload: {e}"),
        })?;
    Ok((interval, payload))
}
