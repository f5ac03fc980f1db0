//! Shared random-access byte stores.
//!
//! A [`ByteStore`] owns its bytes behind an `Arc` (a read-only memory map or an owned
//! buffer). [`ByteView`]s are cheap, cloneable windows `[start, end)` into a store and
//! hand out [`ViewCursor`]s, so any number of threads can read the same backing file at
//! independent positions without sharing cursor state.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::{Result, StoreError};
use crate::varint::decode_varint;

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(bytes) => &bytes[..],
        }
    }
}

/// A read-only byte store shared between any number of views.
#[derive(Debug, Clone)]
pub struct ByteStore {
    backing: Arc<Backing>,
}

impl ByteStore {
    ///
    /// Memory-map the file at `path`.
    ///
    /// The file must not be modified while the store (or any view into it) is alive.
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();

        // zero-length maps are rejected on some platforms
        let backing = if size == 0 {
            Backing::Owned(Vec::new())
        } else {
            Backing::Mapped(unsafe { Mmap::map(&file) }?)
        };

        Ok(ByteStore {
            backing: Arc::new(backing),
        })
    }

    /// Wrap an in-memory buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        ByteStore {
            backing: Arc::new(Backing::Owned(bytes)),
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.backing.bytes().len() as u64
    }

    /// A view over `[start, end)` of the store.
    pub fn view(&self, start: u64, end: u64) -> Result<ByteView> {
        self.full_view().sub_view(start, end)
    }

    /// A view over the whole store.
    pub fn full_view(&self) -> ByteView {
        ByteView {
            backing: Arc::clone(&self.backing),
            start: 0,
            end: self.size(),
        }
    }
}

/// A bounded window `[start, end)` into a [`ByteStore`]. Positions are relative to `start`.
#[derive(Debug, Clone)]
pub struct ByteView {
    backing: Arc<Backing>,
    start: u64,
    end: u64,
}

impl ByteView {
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Absolute offset of this view inside its store.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.start
    }

    /// The bytes of this view.
    pub fn as_slice(&self) -> &[u8] {
        &self.backing.bytes()[self.start as usize..self.end as usize]
    }

    fn check(&self, pos: u64, len: u64) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(StoreError::OutOfBounds {
                pos,
                len,
                size: self.len(),
            }),
        }
    }

    /// `len` raw bytes at `pos`.
    pub fn get_bytes(&self, pos: u64, len: u64) -> Result<&[u8]> {
        self.check(pos, len)?;
        let pos = pos as usize;
        Ok(&self.as_slice()[pos..pos + len as usize])
    }

    /// Little-endian `u32` at `pos`.
    pub fn get_u32(&self, pos: u64) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.get_bytes(pos, 4)?))
    }

    /// Little-endian `u64` at `pos`.
    pub fn get_u64(&self, pos: u64) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.get_bytes(pos, 8)?))
    }

    /// Varint at `pos`, with the number of bytes it occupies.
    pub fn get_varint(&self, pos: u64) -> Result<(u64, usize)> {
        self.check(pos, 0)?;
        let mut cursor = pos as usize;
        let value = decode_varint(self.as_slice(), &mut cursor)?;
        Ok((value, cursor - pos as usize))
    }

    /// `len` bytes of ASCII text at `pos`.
    pub fn get_ascii(&self, pos: u64, len: u64) -> Result<&str> {
        let bytes = self.get_bytes(pos, len)?;
        if !bytes.is_ascii() {
            return Err(StoreError::InvalidText(pos));
        }
        std::str::from_utf8(bytes).map_err(|_| StoreError::InvalidText(pos))
    }

    /// A narrower view over `[start, end)`, relative to this view.
    pub fn sub_view(&self, start: u64, end: u64) -> Result<ByteView> {
        if start > end {
            return Err(StoreError::OutOfBounds {
                pos: start,
                len: 0,
                size: self.len(),
            });
        }
        self.check(start, end - start)?;
        Ok(ByteView {
            backing: Arc::clone(&self.backing),
            start: self.start + start,
            end: self.start + end,
        })
    }

    /// An independent cursor positioned at `pos`.
    pub fn cursor(&self, pos: u64) -> Result<ViewCursor<'_>> {
        self.check(pos, 0)?;
        Ok(ViewCursor {
            data: self.as_slice(),
            pos: pos as usize,
        })
    }
}

/// A positioned reader over a [`ByteView`].
#[derive(Debug, Clone)]
pub struct ViewCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ViewCursor<'_> {
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.data.len().saturating_sub(self.pos) as u64
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        decode_varint(self.data, &mut self.pos)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(LittleEndian::read_u32(bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(LittleEndian::read_u64(bytes))
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if self.remaining() < len as u64 {
            return Err(StoreError::OutOfBounds {
                pos: self.pos as u64,
                len: len as u64,
                size: self.data.len() as u64,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

impl Read for ViewCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len().saturating_sub(self.pos));
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
