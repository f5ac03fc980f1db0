use std::io::{self, Read, Write};

use citree_io::varint::{read_varint, varint_len, write_varint};
use citree_io::{StoreError, ViewCursor};

///
/// One entry of a node list: a boundary of a stored part and the pointer of the
/// region it belongs to.
///
/// In the stop-ordered list `coordinate` is the part's stop, in the start-ordered list
/// it is the part's start.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeEntry {
    pub coordinate: u32,
    pub pointer: u64,
}

impl NodeEntry {
    pub fn new(coordinate: u32, pointer: u64) -> Self {
        NodeEntry {
            coordinate,
            pointer,
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> u64 {
        (varint_len(self.coordinate as u64) + varint_len(self.pointer)) as u64
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<u64> {
        let n = write_varint(writer, self.coordinate as u64)? + write_varint(writer, self.pointer)?;
        Ok(n as u64)
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let coordinate = read_coordinate(read_varint(reader)?)?;
        let pointer = read_varint(reader)?;
        Ok(NodeEntry::new(coordinate, pointer))
    }

    pub fn decode(cursor: &mut ViewCursor<'_>) -> Result<Self, StoreError> {
        let position = cursor.position();
        let coordinate = u32::try_from(cursor.read_varint()?)
            .map_err(|_| StoreError::VarintOverflow(position))?;
        let pointer = cursor.read_varint()?;
        Ok(NodeEntry::new(coordinate, pointer))
    }
}

pub(crate) fn read_coordinate(value: u64) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("coordinate {value} does not fit in 32 bits"),
        )
    })
}

///
/// The two orderings of the parts stored at one node.
///
/// Entries are appended in arrival order; [`NodeLists::sort`] puts `by_stop` in
/// descending stop order and `by_start` in ascending start order, ties broken by
/// ascending pointer so the output is deterministic.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeLists {
    by_stop: Vec<NodeEntry>,
    by_start: Vec<NodeEntry>,
}

impl NodeLists {
    pub fn push(&mut self, start: u32, stop: u32, pointer: u64) {
        self.by_stop.push(NodeEntry::new(stop, pointer));
        self.by_start.push(NodeEntry::new(start, pointer));
    }

    /// Move every entry of `other` into `self`.
    pub fn append(&mut self, mut other: NodeLists) {
        self.by_stop.append(&mut other.by_stop);
        self.by_start.append(&mut other.by_start);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_stop.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_stop.is_empty()
    }

    pub fn by_stop(&self) -> &[NodeEntry] {
        &self.by_stop
    }

    pub fn by_start(&self) -> &[NodeEntry] {
        &self.by_start
    }

    pub fn sort(&mut self) {
        self.by_stop.sort_unstable_by(|a, b| {
            b.coordinate
                .cmp(&a.coordinate)
                .then(a.pointer.cmp(&b.pointer))
        });
        self.by_start
            .sort_unstable_by(|a, b| a.coordinate.cmp(&b.coordinate).then(a.pointer.cmp(&b.pointer)));
    }

    /// Bytes [`NodeLists::write_to`] will produce.
    pub fn encoded_len(&self) -> u64 {
        let entries: u64 = self
            .by_stop
            .iter()
            .chain(self.by_start.iter())
            .map(NodeEntry::encoded_len)
            .sum();
        varint_len(self.len() as u64) as u64 + entries
    }

    ///
    /// Write the list count followed by `count` interleaved (stop entry, start entry) pairs.
    ///
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<u64> {
        let mut written = write_varint(writer, self.len() as u64)? as u64;
        for (stop, start) in self.by_stop.iter().zip(self.by_start.iter()) {
            written += stop.write_to(writer)?;
            written += start.write_to(writer)?;
        }
        Ok(written)
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let count = read_varint(reader)? as usize;
        let mut lists = NodeLists::default();
        for _ in 0..count {
            lists.by_stop.push(NodeEntry::read_from(reader)?);
            lists.by_start.push(NodeEntry::read_from(reader)?);
        }
        Ok(lists)
    }
}
