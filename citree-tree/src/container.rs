//! One file holding a tree per reference sequence.
//!
//! Layout: a fixed header, the trees back to back, a directory mapping each
//! reference name to its tree's byte range, and a JSON metadata block that records
//! the payload type the trees were written with.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{LittleEndian, WriteBytesExt};
use fxhash::FxHashMap;
use log::{debug, info};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use citree_core::models::{Region, RegionSet, SplicedInterval};
use citree_io::{ByteStore, ByteView};

use crate::builder::{BuilderConfig, TreeBuilder, TreeStats, close_temp};
use crate::codec::PayloadCodec;
use crate::consts::{CONTAINER_HEADER_SIZE, CONTAINER_MAGIC, CONTAINER_VERSION, IDLE_CHECK_INTERVAL};
use crate::errors::{Result, TreeError};
use crate::reader::{IntervalTree, Record, RecordIter};

#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub builder: BuilderConfig,
    /// Spill a reference sequence's builder once nothing was added to it for this long.
    pub idle_spill: Option<Duration>,
    /// Recorded in the metadata; set it when the codec compresses its payloads.
    pub compressed: bool,
    /// Free-form entries copied into the metadata block.
    pub info: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub payload_type: String,
    pub compressed: bool,
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// Directory entry: a reference sequence and the byte range of its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub start: u64,
    pub end: u64,
}

/// Summary of a finished container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub trees: Vec<(String, TreeStats)>,
    pub size: u64,
}

impl ContainerStats {
    pub fn interval_count(&self) -> u64 {
        self.trees.iter().map(|(_, s)| s.interval_count as u64).sum()
    }
}

struct ChromBuilder<C: PayloadCodec> {
    builder: TreeBuilder<Arc<C>>,
    last_add: Instant,
}

///
/// Builds a container file, one internal tree per reference sequence.
///
/// Regions may arrive in any order. Reference sequences that stop receiving regions
/// (the usual case for sorted input) are spilled to disk once they have been idle for
/// [`ContainerConfig::idle_spill`], which keeps memory bounded by the sequences still
/// being filled.
///
pub struct MultiTreeBuilder<C: PayloadCodec> {
    path: PathBuf,
    codec: Arc<C>,
    config: ContainerConfig,
    builders: FxHashMap<String, ChromBuilder<C>>,
    adds_since_check: usize,
}

impl<C: PayloadCodec> MultiTreeBuilder<C> {
    pub fn new<P: AsRef<Path>>(path: P, codec: C, config: ContainerConfig) -> Self {
        MultiTreeBuilder {
            path: path.as_ref().to_path_buf(),
            codec: Arc::new(codec),
            config,
            builders: FxHashMap::default(),
            adds_since_check: 0,
        }
    }

    ///
    /// Add a region on `chr` and return its pointer within that sequence's tree.
    ///
    /// Names are stored as ASCII; anything else is rejected before the builder changes.
    ///
    pub fn add(&mut self, chr: &str, interval: &SplicedInterval, payload: &C::Value) -> Result<u64> {
        if !chr.is_ascii() {
            return Err(TreeError::InvalidName(chr.to_string()));
        }
        let pointer = match self.builders.get_mut(chr) {
            Some(chrom) => {
                chrom.last_add = Instant::now();
                chrom.builder.add(interval, payload)?
            }
            None => {
                debug!("Starting tree for {}", chr);
                let mut builder = TreeBuilder::new(Arc::clone(&self.codec), self.config.builder.clone())?;
                let pointer = builder.add(interval, payload)?;
                self.builders.insert(
                    chr.to_string(),
                    ChromBuilder {
                        builder,
                        last_add: Instant::now(),
                    },
                );
                pointer
            }
        };

        self.adds_since_check += 1;
        if self.adds_since_check >= IDLE_CHECK_INTERVAL {
            self.adds_since_check = 0;
            self.spill_idle()?;
        }
        Ok(pointer)
    }

    pub fn add_region(&mut self, region: &Region, payload: &C::Value) -> Result<u64> {
        self.add(&region.chr, &region.interval, payload)
    }

    ///
    /// Spill every builder idle for at least [`ContainerConfig::idle_spill`].
    /// Returns how many builders were spilled.
    ///
    pub fn spill_idle(&mut self) -> Result<usize> {
        let Some(idle) = self.config.idle_spill else {
            return Ok(0);
        };

        let mut spilled = 0;
        for (chr, chrom) in self.builders.iter_mut() {
            if chrom.builder.pending_parts() > 0 && chrom.last_add.elapsed() >= idle {
                debug!("Spilling idle tree for {}", chr);
                chrom.builder.spill()?;
                spilled += 1;
            }
        }
        Ok(spilled)
    }

    pub fn set_info<K: Into<String>>(&mut self, key: K, value: Value) {
        self.config.info.insert(key.into(), value);
    }

    pub fn chroms(&self) -> impl Iterator<Item = &String> {
        self.builders.keys()
    }

    ///
    /// Build every tree (in parallel) and write the container file.
    ///
    pub fn finish(self) -> Result<ContainerStats> {
        let MultiTreeBuilder {
            path,
            codec,
            config,
            builders,
            ..
        } = self;

        let mut builders: Vec<(String, ChromBuilder<C>)> = builders.into_iter().collect();
        builders.sort_by(|a, b| a.0.cmp(&b.0));

        info!("Building {} trees", builders.len());
        let built: Vec<(String, tempfile::NamedTempFile, TreeStats)> = builders
            .into_par_iter()
            .map(|(chr, chrom)| -> Result<_> {
                let mut file = BufWriter::new(config.builder.temp_file()?);
                let stats = chrom.builder.build(&mut file)?;
                let file = file.into_inner().map_err(|e| e.into_error())?;
                Ok((chr, file, stats))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&CONTAINER_MAGIC)?;
        out.write_u32::<LittleEndian>(CONTAINER_VERSION)?;
        // directoryOffset, metadataOffset, metadataLength, patched below
        out.write_u64::<LittleEndian>(0)?;
        out.write_u64::<LittleEndian>(0)?;
        out.write_u64::<LittleEndian>(0)?;

        let mut entries = Vec::with_capacity(built.len());
        let mut trees = Vec::with_capacity(built.len());
        for (name, mut file, stats) in built {
            let start = out.stream_position()?;
            file.seek(SeekFrom::Start(0))?;
            io::copy(&mut file, &mut out)?;
            let end = out.stream_position()?;
            close_temp(file, "tree");

            entries.push(TreeEntry {
                name: name.clone(),
                start,
                end,
            });
            trees.push((name, stats));
        }

        let directory_offset = out.stream_position()?;
        out.write_u32::<LittleEndian>(entries.len() as u32)?;
        for entry in &entries {
            out.write_u32::<LittleEndian>(entry.name.len() as u32)?;
            out.write_all(entry.name.as_bytes())?;
            out.write_u64::<LittleEndian>(entry.start)?;
            out.write_u64::<LittleEndian>(entry.end)?;
        }

        let metadata = ContainerMetadata {
            payload_type: codec.type_name(),
            compressed: config.compressed,
            info: config.info,
        };
        let metadata_offset = out.stream_position()?;
        let metadata = serde_json::to_vec(&metadata)?;
        out.write_all(&metadata)?;
        let size = out.stream_position()?;

        out.seek(SeekFrom::Start(8))?;
        out.write_u64::<LittleEndian>(directory_offset)?;
        out.write_u64::<LittleEndian>(metadata_offset)?;
        out.write_u64::<LittleEndian>(metadata.len() as u64)?;
        out.flush()?;

        info!("Wrote {} ({} bytes, {} trees)", path.display(), size, entries.len());
        Ok(ContainerStats { trees, size })
    }
}

struct ContainerLayout {
    metadata: ContainerMetadata,
    entries: Vec<TreeEntry>,
}

fn parse_container(view: &ByteView) -> Result<ContainerLayout> {
    if view.len() < CONTAINER_HEADER_SIZE {
        return Err(TreeError::CorruptHeader(format!(
            "{} bytes is too short for a container header",
            view.len()
        )));
    }
    let magic: [u8; 4] = view
        .get_bytes(0, 4)?
        .try_into()
        .map_err(|_| TreeError::CorruptHeader("unreadable magic".to_string()))?;
    if magic != CONTAINER_MAGIC {
        return Err(TreeError::BadMagic(magic));
    }
    let version = view.get_u32(4)?;
    if version != CONTAINER_VERSION {
        return Err(TreeError::UnsupportedVersion(version));
    }

    let directory_offset = view.get_u64(8)?;
    let metadata_offset = view.get_u64(16)?;
    let metadata_len = view.get_u64(24)?;

    let metadata: ContainerMetadata =
        serde_json::from_slice(view.get_bytes(metadata_offset, metadata_len)?)?;

    let count = view.get_u32(directory_offset)?;
    let mut pos = directory_offset + 4;
    let mut entries = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        let name_len = view.get_u32(pos)? as u64;
        let name = view.get_ascii(pos + 4, name_len)?.to_string();
        pos += 4 + name_len;
        let start = view.get_u64(pos)?;
        let end = view.get_u64(pos + 8)?;
        pos += 16;

        if start < CONTAINER_HEADER_SIZE || start > end || end > directory_offset {
            return Err(TreeError::CorruptHeader(format!(
                "tree {} spans [{}, {}) outside the tree section",
                name, start, end
            )));
        }
        entries.push(TreeEntry { name, start, end });
    }

    Ok(ContainerLayout { metadata, entries })
}

/// Metadata of the container at `path`, without checking its payload type.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<ContainerMetadata> {
    let store = ByteStore::open(path)?;
    Ok(parse_container(&store.full_view())?.metadata)
}

///
/// Read side of a container file.
///
/// The directory and metadata are read on open; each tree's header is parsed the first
/// time that reference sequence is queried.
///
pub struct MultiTreeReader<C: PayloadCodec> {
    store: ByteStore,
    codec: Arc<C>,
    metadata: ContainerMetadata,
    entries: Vec<TreeEntry>,
    index: FxHashMap<String, usize>,
    trees: Vec<OnceCell<IntervalTree<C>>>,
}

impl<C: PayloadCodec> MultiTreeReader<C> {
    pub fn open<P: AsRef<Path>>(path: P, codec: C) -> Result<Self> {
        MultiTreeReader::from_store(ByteStore::open(path)?, codec)
    }

    pub fn from_store(store: ByteStore, codec: C) -> Result<Self> {
        let ContainerLayout { metadata, entries } = parse_container(&store.full_view())?;

        let expected = codec.type_name();
        if metadata.payload_type != expected {
            return Err(TreeError::PayloadTypeMismatch {
                found: metadata.payload_type,
                expected,
            });
        }

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        let trees = entries.iter().map(|_| OnceCell::new()).collect();

        Ok(MultiTreeReader {
            store,
            codec: Arc::new(codec),
            metadata,
            entries,
            index,
            trees,
        })
    }

    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Reference sequences in the container, in directory order.
    pub fn chroms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// The tree of `chr`, or `None` when the container has no regions on it.
    pub fn tree(&self, chr: &str) -> Result<Option<&IntervalTree<C>>> {
        let Some(&i) = self.index.get(chr) else {
            return Ok(None);
        };
        let entry = &self.entries[i];
        let tree = self.trees[i].get_or_try_init(|| -> Result<IntervalTree<C>> {
            let view = self.store.view(entry.start, entry.end)?;
            Ok(IntervalTree::with_shared_codec(view, Arc::clone(&self.codec)))
        })?;
        Ok(Some(tree))
    }

    pub fn overlapping(&self, chr: &str, start: u32, end: u32) -> Result<Vec<Record<C::Value>>> {
        match self.tree(chr)? {
            Some(tree) => tree.overlapping(start, end),
            None => Ok(Vec::new()),
        }
    }

    pub fn contained(&self, chr: &str, start: u32, end: u32) -> Result<Vec<Record<C::Value>>> {
        match self.tree(chr)? {
            Some(tree) => tree.contained(start, end),
            None => Ok(Vec::new()),
        }
    }

    pub fn point_lookup(&self, region: &Region) -> Result<Option<Record<C::Value>>> {
        match self.tree(&region.chr)? {
            Some(tree) => tree.point_lookup(&region.interval),
            None => Ok(None),
        }
    }

    /// Every record on `chr`, in insertion order.
    pub fn iter_chrom(&self, chr: &str) -> Result<Option<RecordIter<'_, C>>> {
        match self.tree(chr)? {
            Some(tree) => Ok(Some(tree.iter()?)),
            None => Ok(None),
        }
    }

    ///
    /// Records with a part overlapping any part of `region`, each reported once.
    ///
    pub fn overlapping_region(&self, region: &Region) -> Result<Vec<Record<C::Value>>> {
        let Some(tree) = self.tree(&region.chr)? else {
            return Ok(Vec::new());
        };
        if !region.is_spliced() {
            return tree.overlapping(region.start(), region.end());
        }

        let mut seen = BTreeSet::new();
        let mut records = Vec::new();
        for part in region.interval.parts() {
            for record in tree.overlapping(part.start, part.end)? {
                if seen.insert(record.pointer) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    ///
    /// Records overlapping each region of `query`, tagged with the query's index.
    ///
    pub fn find_overlaps(&self, query: &RegionSet) -> Result<Vec<(usize, Record<C::Value>)>> {
        let mut hits = Vec::new();
        for (i, region) in query.regions.iter().enumerate() {
            for record in self.overlapping_region(region)? {
                hits.push((i, record));
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use citree_core::models::Interval;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use crate::codec::{GzipCodec, StringCodec, UnitCodec};

    fn region(chr: &str, parts: &[(u32, u32)], name: &str) -> (Region, String) {
        let interval =
            SplicedInterval::new(parts.iter().map(|&(s, e)| Interval::new(s, e)).collect()).unwrap();
        (
            Region {
                chr: chr.to_string(),
                interval,
                rest: None,
            },
            name.to_string(),
        )
    }

    #[fixture]
    fn regions() -> Vec<(Region, String)> {
        vec![
            region("chr2", &[(10, 20)], "a"),
            region("chr1", &[(10, 20)], "A"),
            region("chr1", &[(15, 25)], "B"),
            region("chrX", &[(1000, 1100), (1200, 1300)], "tx"),
            region("chr1", &[(100, 110)], "C"),
        ]
    }

    fn write<C: PayloadCodec<Value = String>>(
        path: &Path,
        codec: C,
        config: ContainerConfig,
        regions: &[(Region, String)],
    ) -> ContainerStats {
        let mut builder = MultiTreeBuilder::new(path, codec, config);
        for (region, name) in regions {
            builder.add_region(region, name).unwrap();
        }
        builder.finish().unwrap()
    }

    fn names(records: Vec<Record<String>>) -> Vec<String> {
        records.into_iter().map(|r| r.payload).collect()
    }

    #[rstest]
    fn test_round_trip(regions: Vec<(Region, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.cti");

        let mut config = ContainerConfig::default();
        config.info.insert("source".to_string(), json!("unit test"));
        let stats = write(&path, StringCodec, config, &regions);
        assert_eq!(stats.interval_count(), 5);
        assert_eq!(stats.size, std::fs::metadata(&path).unwrap().len());

        let reader = MultiTreeReader::open(&path, StringCodec).unwrap();
        assert_eq!(reader.chroms().collect::<Vec<_>>(), vec!["chr1", "chr2", "chrX"]);
        assert_eq!(reader.metadata().payload_type, "string");
        assert_eq!(reader.metadata().info["source"], json!("unit test"));

        assert_eq!(names(reader.overlapping("chr1", 18, 22).unwrap()), vec!["A", "B"]);
        assert_eq!(names(reader.overlapping("chr2", 18, 22).unwrap()), vec!["a"]);
        assert!(reader.overlapping("chr3", 0, 100).unwrap().is_empty());
        assert_eq!(names(reader.contained("chrX", 0, 2000).unwrap()), vec!["tx"]);

        let (tx, _) = &regions[3];
        assert_eq!(reader.point_lookup(tx).unwrap().unwrap().payload, "tx");

        let all: Vec<String> = reader
            .iter_chrom("chr1")
            .unwrap()
            .unwrap()
            .map(|r| r.unwrap().payload)
            .collect();
        assert_eq!(all, vec!["A", "B", "C"]);
        assert!(reader.iter_chrom("chrY").unwrap().is_none());
    }

    #[rstest]
    fn test_non_ascii_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.cti");

        let mut builder = MultiTreeBuilder::new(&path, StringCodec, ContainerConfig::default());
        let (good, name) = region("chr1", &[(10, 20)], "A");
        builder.add_region(&good, &name).unwrap();

        let (bad, name) = region("chr\u{e9}", &[(10, 20)], "B");
        let err = builder.add_region(&bad, &name).unwrap_err();
        assert!(matches!(err, TreeError::InvalidName(ref n) if n == "chr\u{e9}"));
        assert_eq!(builder.chroms().collect::<Vec<_>>(), vec!["chr1"]);

        builder.finish().unwrap();
        let reader = MultiTreeReader::open(&path, StringCodec).unwrap();
        assert_eq!(reader.chroms().collect::<Vec<_>>(), vec!["chr1"]);
        assert_eq!(names(reader.overlapping("chr1", 0, 100).unwrap()), vec!["A"]);
    }

    #[rstest]
    fn test_payload_type_is_checked(regions: Vec<(Region, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.cti");
        write(&path, StringCodec, ContainerConfig::default(), &regions);

        let err = MultiTreeReader::open(&path, UnitCodec).err().unwrap();
        assert!(matches!(err, TreeError::PayloadTypeMismatch { .. }));
    }

    #[rstest]
    fn test_compressed_payloads(regions: Vec<(Region, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.cti");
        let config = ContainerConfig {
            compressed: true,
            ..Default::default()
        };
        write(&path, GzipCodec::new(StringCodec), config, &regions);

        let metadata = read_metadata(&path).unwrap();
        assert!(metadata.compressed);
        assert_eq!(metadata.payload_type, "gzip<string>");

        let reader = MultiTreeReader::open(&path, GzipCodec::new(StringCodec)).unwrap();
        assert_eq!(names(reader.overlapping("chrX", 1250, 1251).unwrap()), vec!["tx"]);
    }

    #[rstest]
    fn test_idle_spill_does_not_change_results(regions: Vec<(Region, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.cti");
        let spilled = dir.path().join("spilled.cti");

        write(&plain, StringCodec, ContainerConfig::default(), &regions);

        let config = ContainerConfig {
            builder: BuilderConfig::default().with_temp_dir(dir.path()),
            idle_spill: Some(Duration::ZERO),
            ..Default::default()
        };
        let mut builder = MultiTreeBuilder::new(&spilled, StringCodec, config);
        for (region, name) in &regions {
            builder.add_region(region, name).unwrap();
            assert!(builder.spill_idle().unwrap() >= 1);
        }
        builder.finish().unwrap();

        assert_eq!(std::fs::read(&plain).unwrap(), std::fs::read(&spilled).unwrap());
    }

    #[rstest]
    fn test_find_overlaps(regions: Vec<(Region, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.cti");
        write(&path, StringCodec, ContainerConfig::default(), &regions);
        let reader = MultiTreeReader::open(&path, StringCodec).unwrap();

        let query = RegionSet::from(vec![
            region("chr1", &[(12, 13), (16, 17)], "q1").0,
            region("chrX", &[(1100, 1200)], "q2").0,
            region("chr9", &[(0, 10)], "q3").0,
        ]);
        let hits: Vec<(usize, String)> = reader
            .find_overlaps(&query)
            .unwrap()
            .into_iter()
            .map(|(i, r)| (i, r.payload))
            .collect();
        assert_eq!(hits, vec![(0, "A".to_string()), (0, "B".to_string())]);
    }

    #[rstest]
    fn test_bad_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cti");
        std::fs::write(&path, b"CTMC\x02\x00\x00\x00").unwrap();
        assert!(matches!(
            MultiTreeReader::open(&path, StringCodec).err().unwrap(),
            TreeError::CorruptHeader(_)
        ));

        let mut bytes = b"CTMC".to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.resize(CONTAINER_HEADER_SIZE as usize, 0);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            MultiTreeReader::open(&path, StringCodec).err().unwrap(),
            TreeError::UnsupportedVersion(7)
        ));
    }

    #[rstest]
    fn test_empty_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cti");
        let builder = MultiTreeBuilder::new(&path, StringCodec, ContainerConfig::default());
        let stats = builder.finish().unwrap();
        assert!(stats.trees.is_empty());

        let reader = MultiTreeReader::open(&path, StringCodec).unwrap();
        assert_eq!(reader.chroms().count(), 0);
        assert!(reader.overlapping("chr1", 0, 10).unwrap().is_empty());
    }
}
