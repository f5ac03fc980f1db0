//! LEB128 variable-length unsigned integer encoding.

use std::io::{self, Read, Write};

use crate::error::{Result, StoreError};

/// Largest encoded size of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode an unsigned 64-bit integer as LEB128 into `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Number of bytes [`encode_varint`] produces for `value`.
#[inline]
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Write `value` as LEB128, returning the number of bytes written.
pub fn write_varint<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut value = value;
    let mut n = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf[n] = byte;
        n += 1;
        if value == 0 {
            break;
        }
    }
    writer.write_all(&buf[..n])?;
    Ok(n)
}

/// Read one LEB128 value from `reader`.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        let payload = (byte[0] & 0x7F) as u64;
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"));
        }
        result |= payload << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Decode a LEB128 unsigned 64-bit integer from `buf` starting at `*pos`.
/// Advances `*pos` past the consumed bytes.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let start = *pos;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        if *pos >= buf.len() {
            return Err(StoreError::TruncatedVarint(start as u64));
        }
        let byte = buf[*pos];
        *pos += 1;

        let payload = (byte & 0x7F) as u64;
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(StoreError::VarintOverflow(start as u64));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}
