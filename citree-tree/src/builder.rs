//! Tree construction.
//!
//! Both builders accumulate node lists in memory, keyed by node coordinate, and move
//! them to a single append-only spill file whenever the number of buffered parts
//! reaches [`BuilderConfig::spill_threshold`]. [`TreeBuilder`] additionally writes
//! every record to a side data file as it is added, so the pointer it returns is the
//! record's final offset in the Data section.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, warn};
use tempfile::NamedTempFile;

use citree_core::models::SplicedInterval;
use citree_io::varint::{read_varint, write_varint};

use crate::codec::PayloadCodec;
use crate::consts::{
    DEFAULT_SPILL_THRESHOLD, EXTERNAL_MAGIC, HEADER_SIZE, INTERNAL_MAGIC, MAX_BOUNDARY, NODE_SIZE,
    SECTION_OFFSETS_POS,
};
use crate::coordinate::{assign, grow_max};
use crate::entry::{NodeLists, read_coordinate};
use crate::errors::{Result, TreeError};
use crate::record::encode_record;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Directory for spill and data files; the system temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Interval-parts kept in memory before spilling.
    pub spill_threshold: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            temp_dir: None,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
        }
    }
}

impl BuilderConfig {
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_spill_threshold(mut self, spill_threshold: usize) -> Self {
        self.spill_threshold = spill_threshold;
        self
    }

    pub(crate) fn temp_file(&self) -> io::Result<NamedTempFile> {
        match &self.temp_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
    }
}

/// Summary of a written tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub node_count: u32,
    pub interval_count: u32,
    pub max: u32,
    /// Bytes written, header included.
    pub size: u64,
}

/// Remove a temporary file, logging instead of failing when that does not work.
pub(crate) fn close_temp(file: NamedTempFile, kind: &str) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!("Could not remove {} file {}: {}", kind, path.display(), e);
    }
}

fn rewind(writer: BufWriter<NamedTempFile>) -> Result<NamedTempFile> {
    let mut file = writer.into_inner().map_err(|e| e.into_error())?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

///
/// Node lists under construction, shared by both builders.
///
#[derive(Debug)]
struct NodeAccumulator {
    config: BuilderConfig,
    max: u32,
    nodes: BTreeMap<u32, NodeLists>,
    pending: usize,
    spill: Option<BufWriter<NamedTempFile>>,
    spilled: usize,
    intervals: u64,
}

impl NodeAccumulator {
    fn new(config: BuilderConfig) -> Self {
        NodeAccumulator {
            config,
            max: 1,
            nodes: BTreeMap::new(),
            pending: 0,
            spill: None,
            spilled: 0,
            intervals: 0,
        }
    }

    fn check(&self, interval: &SplicedInterval) -> Result<()> {
        if let Some(value) = interval.boundaries().find(|&b| b > MAX_BOUNDARY) {
            return Err(TreeError::BoundaryOutOfRange {
                value,
                limit: MAX_BOUNDARY,
            });
        }
        if self.intervals >= u32::MAX as u64 {
            return Err(TreeError::Capacity(format!(
                "a tree holds at most {} regions",
                u32::MAX
            )));
        }
        Ok(())
    }

    fn add(&mut self, interval: &SplicedInterval, pointer: u64) -> Result<()> {
        self.check(interval)?;

        self.max = grow_max(self.max, interval.last());
        for part in interval.parts() {
            let coordinate = assign(part.start, part.end, self.max);
            self.nodes
                .entry(coordinate)
                .or_default()
                .push(part.start, part.end, pointer);
        }
        self.pending += interval.num_parts();
        self.intervals += 1;

        if self.pending >= self.config.spill_threshold {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        if self.spill.is_none() {
            self.spill = Some(BufWriter::new(self.config.temp_file()?));
        }

        let nodes = std::mem::take(&mut self.nodes);
        if let Some(writer) = self.spill.as_mut() {
            for (coordinate, lists) in &nodes {
                write_varint(writer, *coordinate as u64)?;
                lists.write_to(writer)?;
            }
        }

        debug!(
            "Spilled {} parts across {} nodes to disk",
            self.pending,
            nodes.len()
        );
        self.spilled += self.pending;
        self.pending = 0;
        Ok(())
    }

    fn from_disk(&mut self) -> Result<()> {
        let Some(writer) = self.spill.take() else {
            return Ok(());
        };
        let file = rewind(writer)?;

        let mut restored = 0;
        {
            let mut reader = BufReader::new(file.as_file());
            while !reader.fill_buf()?.is_empty() {
                let coordinate = read_coordinate(read_varint(&mut reader)?)?;
                let lists = NodeLists::read_from(&mut reader)?;
                restored += lists.len();
                self.nodes.entry(coordinate).or_default().append(lists);
            }
        }
        close_temp(file, "spill");

        debug!("Restored {} spilled parts", restored);
        self.pending += restored;
        self.spilled = 0;
        Ok(())
    }

    fn write_tree<W: Write + Seek>(
        mut self,
        magic: [u8; 4],
        out: &mut W,
        data: Option<&mut dyn Read>,
    ) -> Result<TreeStats> {
        self.from_disk()?;
        for lists in self.nodes.values_mut() {
            lists.sort();
        }

        let node_count = u32::try_from(self.nodes.len())
            .map_err(|_| TreeError::Capacity(format!("{} nodes", self.nodes.len())))?;
        let interval_count = self.intervals as u32;

        let start = out.stream_position()?;
        out.write_all(&magic)?;
        out.write_u32::<LittleEndian>(node_count)?;
        out.write_u32::<LittleEndian>(interval_count)?;
        out.write_u32::<LittleEndian>(self.max)?;
        // listsOffset and dataOffset, patched below
        out.write_u64::<LittleEndian>(0)?;
        out.write_u64::<LittleEndian>(0)?;

        let mut list_offset = 0u64;
        for (coordinate, lists) in &self.nodes {
            out.write_u32::<LittleEndian>(*coordinate)?;
            out.write_u64::<LittleEndian>(list_offset)?;
            list_offset += lists.encoded_len();
        }

        let lists_offset = HEADER_SIZE + node_count as u64 * NODE_SIZE;
        for lists in self.nodes.values() {
            lists.write_to(out)?;
        }
        let data_offset = lists_offset + list_offset;

        if let Some(data) = data {
            io::copy(data, out)?;
        }

        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(start + SECTION_OFFSETS_POS))?;
        out.write_u64::<LittleEndian>(lists_offset)?;
        out.write_u64::<LittleEndian>(data_offset)?;
        out.seek(SeekFrom::Start(end))?;

        debug!(
            "Wrote tree: {} regions, {} nodes, max {}, {} bytes",
            interval_count,
            node_count,
            self.max,
            end - start
        );

        Ok(TreeStats {
            node_count,
            interval_count,
            max: self.max,
            size: end - start,
        })
    }
}

///
/// Builds a tree over caller-managed pointers (byte offsets, row ids, ...).
///
/// The written tree has an empty Data section; the pointers handed to
/// [`ExternalTreeBuilder::add`] come back from queries unchanged.
///
#[derive(Debug)]
pub struct ExternalTreeBuilder {
    nodes: NodeAccumulator,
}

impl ExternalTreeBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        ExternalTreeBuilder {
            nodes: NodeAccumulator::new(config),
        }
    }

    ///
    /// Index `interval` under `pointer`.
    ///
    /// Rejected regions (a boundary above [`MAX_BOUNDARY`]) leave the builder untouched.
    ///
    pub fn add(&mut self, interval: &SplicedInterval, pointer: u64) -> Result<()> {
        self.nodes.add(interval, pointer)
    }

    /// Move the buffered node lists to the spill file.
    pub fn spill(&mut self) -> Result<()> {
        self.nodes.spill()
    }

    /// Merge everything spilled so far back into memory.
    pub fn from_disk(&mut self) -> Result<()> {
        self.nodes.from_disk()
    }

    pub fn max(&self) -> u32 {
        self.nodes.max
    }

    /// Regions added so far.
    pub fn len(&self) -> u64 {
        self.nodes.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.intervals == 0
    }

    /// Parts currently buffered in memory.
    pub fn pending_parts(&self) -> usize {
        self.nodes.pending
    }

    /// Write the tree at the current position of `out`.
    pub fn build<W: Write + Seek>(self, out: &mut W) -> Result<TreeStats> {
        self.nodes.write_tree(EXTERNAL_MAGIC, out, None)
    }

    pub fn build_to_path<P: AsRef<Path>>(self, path: P) -> Result<TreeStats> {
        let mut out = BufWriter::new(File::create(path)?);
        let stats = self.build(&mut out)?;
        out.flush()?;
        Ok(stats)
    }
}

///
/// Builds a tree that stores its own records: boundaries plus a payload encoded with
/// the builder's [`PayloadCodec`].
///
pub struct TreeBuilder<C: PayloadCodec> {
    nodes: NodeAccumulator,
    codec: C,
    data: BufWriter<NamedTempFile>,
    data_len: u64,
    scratch: Vec<u8>,
}

impl<C: PayloadCodec> TreeBuilder<C> {
    pub fn new(codec: C, config: BuilderConfig) -> Result<Self> {
        let data = BufWriter::new(config.temp_file()?);
        Ok(TreeBuilder {
            nodes: NodeAccumulator::new(config),
            codec,
            data,
            data_len: 0,
            scratch: Vec::new(),
        })
    }

    ///
    /// Store `interval` with its payload and return the record's offset in the Data section.
    ///
    /// Rejected regions (a boundary above [`MAX_BOUNDARY`]) leave the builder untouched.
    ///
    pub fn add(&mut self, interval: &SplicedInterval, payload: &C::Value) -> Result<u64> {
        self.nodes.check(interval)?;

        self.scratch.clear();
        encode_record(interval, payload, &self.codec, &mut self.scratch)?;

        let pointer = self.data_len;
        self.data.write_all(&self.scratch)?;
        self.data_len += self.scratch.len() as u64;

        self.nodes.add(interval, pointer)?;
        Ok(pointer)
    }

    pub fn spill(&mut self) -> Result<()> {
        self.nodes.spill()
    }

    pub fn from_disk(&mut self) -> Result<()> {
        self.nodes.from_disk()
    }

    pub fn max(&self) -> u32 {
        self.nodes.max
    }

    pub fn len(&self) -> u64 {
        self.nodes.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.intervals == 0
    }

    pub fn pending_parts(&self) -> usize {
        self.nodes.pending
    }

    /// Bytes of record data written so far.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Write the tree, records included, at the current position of `out`.
    pub fn build<W: Write + Seek>(self, out: &mut W) -> Result<TreeStats> {
        let TreeBuilder { nodes, data, .. } = self;
        let file = rewind(data)?;

        let stats = {
            let mut reader = BufReader::new(file.as_file());
            let data: &mut dyn Read = &mut reader;
            nodes.write_tree(INTERNAL_MAGIC, out, Some(data))?
        };
        close_temp(file, "data");

        Ok(stats)
    }

    pub fn build_to_path<P: AsRef<Path>>(self, path: P) -> Result<TreeStats> {
        let mut out = BufWriter::new(File::create(path)?);
        let stats = self.build(&mut out)?;
        out.flush()?;
        Ok(stats)
    }
}
