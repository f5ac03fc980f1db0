//! Query side of a single tree.
//!
//! [`TreeReader`] answers pointer-level queries straight from a [`ByteView`]; the header
//! is parsed lazily and exactly once, even when the first queries race on several
//! threads. [`IntervalTree`] layers record decoding on top for trees that store their
//! own payloads.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use citree_core::models::SplicedInterval;
use citree_io::{ByteStore, ByteView, ViewCursor};

use crate::codec::PayloadCodec;
use crate::consts::{EXTERNAL_MAGIC, HEADER_SIZE, INTERNAL_MAGIC, NODE_SIZE};
use crate::coordinate::{assign, plan_overlap};
use crate::entry::NodeEntry;
use crate::errors::{Result, TreeError};
use crate::record::{decode_boundaries, decode_record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Pointers are offsets into the tree's own Data section.
    Internal,
    /// Pointers belong to the caller.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeHeader {
    pub mode: PayloadMode,
    pub node_count: u32,
    pub interval_count: u32,
    pub max: u32,
    pub lists_offset: u64,
    pub data_offset: u64,
}

impl TreeHeader {
    fn parse(view: &ByteView) -> Result<Self> {
        if view.len() < HEADER_SIZE {
            return Err(TreeError::CorruptHeader(format!(
                "{} bytes is too short for a tree header",
                view.len()
            )));
        }

        let magic: [u8; 4] = view
            .get_bytes(0, 4)?
            .try_into()
            .map_err(|_| TreeError::CorruptHeader("unreadable magic".to_string()))?;
        let mode = match magic {
            INTERNAL_MAGIC => PayloadMode::Internal,
            EXTERNAL_MAGIC => PayloadMode::External,
            other => return Err(TreeError::BadMagic(other)),
        };

        let header = TreeHeader {
            mode,
            node_count: view.get_u32(4)?,
            interval_count: view.get_u32(8)?,
            max: view.get_u32(12)?,
            lists_offset: view.get_u64(16)?,
            data_offset: view.get_u64(24)?,
        };

        if !header.max.is_power_of_two() {
            return Err(TreeError::CorruptHeader(format!(
                "max {} is not a power of two",
                header.max
            )));
        }
        if header.lists_offset != HEADER_SIZE + header.node_count as u64 * NODE_SIZE {
            return Err(TreeError::CorruptHeader(format!(
                "lists offset {} does not follow {} nodes",
                header.lists_offset, header.node_count
            )));
        }
        if header.data_offset < header.lists_offset || header.data_offset > view.len() {
            return Err(TreeError::CorruptHeader(format!(
                "data offset {} is outside [{}, {}]",
                header.data_offset,
                header.lists_offset,
                view.len()
            )));
        }

        Ok(header)
    }
}

#[derive(Debug, Clone)]
struct Layout {
    header: TreeHeader,
    nodes: ByteView,
    lists: ByteView,
    data: ByteView,
}

///
/// Pointer-level queries over one serialized tree.
///
/// Every pointer-level query treats parts as closed `[start, stop]` ranges and returns
/// each matching pointer once, in ascending pointer order.
///
#[derive(Debug)]
pub struct TreeReader {
    view: ByteView,
    layout: OnceCell<Layout>,
}

impl TreeReader {
    pub fn new(view: ByteView) -> Self {
        TreeReader {
            view,
            layout: OnceCell::new(),
        }
    }

    /// Memory-map a file holding a single tree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(TreeReader::new(ByteStore::open(path)?.full_view()))
    }

    fn layout(&self) -> Result<&Layout> {
        self.layout.get_or_try_init(|| -> Result<Layout> {
            let header = TreeHeader::parse(&self.view)?;
            debug!(
                "Parsed tree header at offset {}: {} regions in {} nodes, max {}",
                self.view.offset(),
                header.interval_count,
                header.node_count,
                header.max
            );
            Ok(Layout {
                nodes: self.view.sub_view(HEADER_SIZE, header.lists_offset)?,
                lists: self.view.sub_view(header.lists_offset, header.data_offset)?,
                data: self.view.sub_view(header.data_offset, self.view.len())?,
                header,
            })
        })
    }

    pub fn header(&self) -> Result<&TreeHeader> {
        Ok(&self.layout()?.header)
    }

    pub fn view(&self) -> &ByteView {
        &self.view
    }

    fn node(layout: &Layout, index: u32) -> Result<(u32, u64)> {
        let pos = index as u64 * NODE_SIZE;
        Ok((layout.nodes.get_u32(pos)?, layout.nodes.get_u64(pos + 4)?))
    }

    /// Index of the first node whose coordinate is not below `coordinate`.
    fn lower_bound(layout: &Layout, coordinate: u32) -> Result<u32> {
        let mut size = layout.header.node_count;
        let mut low = 0;

        while size > 0 {
            let half = size / 2;
            let other_half = size - half;
            let probe = low + half;
            let other_low = low + other_half;
            let (v, _) = Self::node(layout, probe)?;
            size = half;
            low = if v < coordinate { other_low } else { low }
        }
        Ok(low)
    }

    ///
    /// List offsets of every node whose coordinate lies in `[left, right]`.
    ///
    pub fn find_all_in_range(&self, left: u32, right: u32) -> Result<Vec<u64>> {
        let layout = self.layout()?;
        let mut offsets = Vec::new();

        let mut index = Self::lower_bound(layout, left)?;
        while index < layout.header.node_count {
            let (coordinate, offset) = Self::node(layout, index)?;
            if coordinate > right {
                break;
            }
            offsets.push(offset);
            index += 1;
        }
        Ok(offsets)
    }

    /// List offset of the node at exactly `coordinate`, if it holds any parts.
    pub fn find_one(&self, coordinate: u32) -> Result<Option<u64>> {
        let layout = self.layout()?;
        let index = Self::lower_bound(layout, coordinate)?;
        if index < layout.header.node_count {
            let (found, offset) = Self::node(layout, index)?;
            if found == coordinate {
                return Ok(Some(offset));
            }
        }
        Ok(None)
    }

    /// Walk the (stop entry, start entry) pairs of one list until `visit` returns false.
    fn scan_list<F>(layout: &Layout, offset: u64, mut visit: F) -> Result<()>
    where
        F: FnMut(NodeEntry, NodeEntry) -> bool,
    {
        let mut cursor: ViewCursor<'_> = layout.lists.cursor(offset)?;
        let count = cursor.read_varint()?;
        for _ in 0..count {
            let by_stop = NodeEntry::decode(&mut cursor)?;
            let by_start = NodeEntry::decode(&mut cursor)?;
            if !visit(by_stop, by_start) {
                break;
            }
        }
        Ok(())
    }

    fn check_query(left: u32, right: u32) -> Result<()> {
        if left > right {
            return Err(TreeError::InvalidQuery {
                start: left,
                end: right,
            });
        }
        Ok(())
    }

    ///
    /// Pointers of every region with a part intersecting `[left, right]`.
    ///
    pub fn overlapping_pointers(&self, left: u32, right: u32) -> Result<Vec<u64>> {
        Self::check_query(left, right)?;
        let layout = self.layout()?;
        let plan = plan_overlap(left, right, layout.header.max);
        let mut found = BTreeSet::new();

        for coordinate in plan.below {
            if let Some(offset) = self.find_one(coordinate)? {
                Self::scan_list(layout, offset, |by_stop, _| {
                    if by_stop.coordinate < left {
                        return false;
                    }
                    found.insert(by_stop.pointer);
                    true
                })?;
            }
        }

        for coordinate in plan.above {
            if let Some(offset) = self.find_one(coordinate)? {
                Self::scan_list(layout, offset, |_, by_start| {
                    if by_start.coordinate > right {
                        return false;
                    }
                    found.insert(by_start.pointer);
                    true
                })?;
            }
        }

        for offset in self.find_all_in_range(left, right)? {
            Self::scan_list(layout, offset, |by_stop, _| {
                found.insert(by_stop.pointer);
                true
            })?;
        }

        Ok(found.into_iter().collect())
    }

    ///
    /// Pointers of every part stored at a node inside `[left, right]`.
    ///
    /// A region lying entirely inside the range always has its first part stored at such
    /// a node, so this is a superset of the regions contained in the range.
    ///
    pub fn range_pointers(&self, left: u32, right: u32) -> Result<Vec<u64>> {
        Self::check_query(left, right)?;
        let layout = self.layout()?;
        let mut found = BTreeSet::new();
        for offset in self.find_all_in_range(left, right)? {
            Self::scan_list(layout, offset, |by_stop, _| {
                found.insert(by_stop.pointer);
                true
            })?;
        }
        Ok(found.into_iter().collect())
    }

    /// Pointers of every part stored at the node `coordinate`.
    pub fn pointers_at(&self, coordinate: u32) -> Result<Vec<u64>> {
        let layout = self.layout()?;
        let mut found = BTreeSet::new();
        if let Some(offset) = self.find_one(coordinate)? {
            Self::scan_list(layout, offset, |by_stop, _| {
                found.insert(by_stop.pointer);
                true
            })?;
        }
        Ok(found.into_iter().collect())
    }
}

/// A decoded record of an internal tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    /// Offset of the record in the Data section.
    pub pointer: u64,
    pub interval: SplicedInterval,
    pub payload: T,
}

///
/// Record-level queries over a tree built with [`TreeBuilder`](crate::TreeBuilder).
///
/// Queries here use half-open semantics on both sides: a part `[a, b)` overlaps
/// `[start, end)` when `a < end && start < b`, and a region is contained when every part
/// lies within `[start, end]`.
///
pub struct IntervalTree<C: PayloadCodec> {
    reader: TreeReader,
    codec: Arc<C>,
}

impl<C: PayloadCodec> IntervalTree<C> {
    pub fn new(view: ByteView, codec: C) -> Self {
        IntervalTree::with_shared_codec(view, Arc::new(codec))
    }

    pub fn with_shared_codec(view: ByteView, codec: Arc<C>) -> Self {
        IntervalTree {
            reader: TreeReader::new(view),
            codec,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P, codec: C) -> Result<Self> {
        Ok(IntervalTree::new(ByteStore::open(path)?.full_view(), codec))
    }

    pub fn reader(&self) -> &TreeReader {
        &self.reader
    }

    pub fn header(&self) -> Result<&TreeHeader> {
        self.reader.header()
    }

    fn data(&self) -> Result<&ByteView> {
        let layout = self.reader.layout()?;
        match layout.header.mode {
            PayloadMode::Internal => Ok(&layout.data),
            PayloadMode::External => Err(TreeError::PayloadNotManaged),
        }
    }

    /// Decode the record at `pointer` if its boundaries pass `keep`.
    fn read_matching<F>(&self, pointer: u64, keep: F) -> Result<Option<Record<C::Value>>>
    where
        F: Fn(&SplicedInterval) -> bool,
    {
        let data = self.data()?;
        let mut cursor = data.cursor(pointer)?;
        let interval = decode_boundaries(&mut cursor)?;
        if !keep(&interval) {
            return Ok(None);
        }
        let payload = self
            .codec
            .decode(&mut cursor)
            .map_err(|e| TreeError::CorruptRecord {
                pointer,
                reason: format!("payload: {e}"),
            })?;
        Ok(Some(Record {
            pointer,
            interval,
            payload,
        }))
    }

    fn collect<F>(&self, pointers: Vec<u64>, keep: F) -> Result<Vec<Record<C::Value>>>
    where
        F: Fn(&SplicedInterval) -> bool,
    {
        let mut records = Vec::new();
        for pointer in pointers {
            if let Some(record) = self.read_matching(pointer, &keep)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn record_at(&self, pointer: u64) -> Result<Record<C::Value>> {
        let data = self.data()?;
        let mut cursor = data.cursor(pointer)?;
        let (interval, payload) = decode_record(&mut cursor, self.codec.as_ref())?;
        Ok(Record {
            pointer,
            interval,
            payload,
        })
    }

    ///
    /// Every record with at least one part overlapping `[start, end)`, in pointer order.
    ///
    pub fn overlapping(&self, start: u32, end: u32) -> Result<Vec<Record<C::Value>>> {
        let pointers = self.reader.overlapping_pointers(start, end)?;
        self.collect(pointers, |interval| interval.overlaps(start, end))
    }

    ///
    /// Every record whose parts all lie within `[start, end]`, in pointer order.
    ///
    pub fn contained(&self, start: u32, end: u32) -> Result<Vec<Record<C::Value>>> {
        let pointers = self.reader.range_pointers(start, end)?;
        self.collect(pointers, |interval| interval.contained_in(start, end))
    }

    ///
    /// The first record (in pointer order) with exactly the boundaries of `interval`.
    ///
    pub fn point_lookup(&self, interval: &SplicedInterval) -> Result<Option<Record<C::Value>>> {
        let max = self.header()?.max;
        if interval.last() >= max {
            return Ok(None);
        }

        let first = interval.parts()[0];
        let coordinate = assign(first.start, first.end, max);
        for pointer in self.reader.pointers_at(coordinate)? {
            if let Some(record) = self.read_matching(pointer, |candidate| candidate == interval)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Every record of the tree, in insertion order.
    pub fn iter(&self) -> Result<RecordIter<'_, C>> {
        let data = self.data()?;
        Ok(RecordIter {
            cursor: data.cursor(0)?,
            codec: self.codec.as_ref(),
            failed: false,
        })
    }
}

pub struct RecordIter<'a, C: PayloadCodec> {
    cursor: ViewCursor<'a>,
    codec: &'a C,
    failed: bool,
}

impl<C: PayloadCodec> Iterator for RecordIter<'_, C> {
    type Item = Result<Record<C::Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_at_end() {
            return None;
        }
        let pointer = self.cursor.position();
        match decode_record(&mut self.cursor, self.codec) {
            Ok((interval, payload)) => Some(Ok(Record {
                pointer,
                interval,
                payload,
            })),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use citree_core::models::Interval;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::{fixture, rstest};
    use std::io::Cursor;

    use crate::builder::{BuilderConfig, ExternalTreeBuilder, TreeBuilder};
    use crate::codec::{StringCodec, UnitCodec};

    fn spliced(parts: &[(u32, u32)]) -> SplicedInterval {
        SplicedInterval::new(parts.iter().map(|&(s, e)| Interval::new(s, e)).collect()).unwrap()
    }

    fn view_of(bytes: Vec<u8>) -> ByteView {
        ByteStore::from_vec(bytes).full_view()
    }

    fn build_tree(regions: &[(SplicedInterval, &str)], config: BuilderConfig) -> IntervalTree<StringCodec> {
        let mut builder = TreeBuilder::new(StringCodec, config).unwrap();
        for (interval, name) in regions {
            builder.add(interval, &name.to_string()).unwrap();
        }
        let mut out = Cursor::new(Vec::new());
        builder.build(&mut out).unwrap();
        IntervalTree::new(view_of(out.into_inner()), StringCodec)
    }

    fn names(records: Vec<Record<String>>) -> Vec<String> {
        records.into_iter().map(|r| r.payload).collect()
    }

    #[fixture]
    fn abc() -> IntervalTree<StringCodec> {
        build_tree(
            &[
                (spliced(&[(10, 20)]), "A"),
                (spliced(&[(15, 25)]), "B"),
                (spliced(&[(100, 110)]), "C"),
            ],
            BuilderConfig::default(),
        )
    }

    #[rstest]
    #[case(18, 22, vec!["A", "B"])]
    #[case(0, 5, vec![])]
    #[case(26, 99, vec![])]
    #[case(105, 106, vec!["C"])]
    #[case(0, 1000, vec!["A", "B", "C"])]
    #[case(20, 21, vec!["B"])]
    #[case(110, 120, vec![])]
    fn test_overlapping(abc: IntervalTree<StringCodec>, #[case] start: u32, #[case] end: u32, #[case] expected: Vec<&str>) {
        assert_eq!(names(abc.overlapping(start, end).unwrap()), expected);
    }

    #[rstest]
    fn test_contained(abc: IntervalTree<StringCodec>) {
        assert_eq!(names(abc.contained(10, 25).unwrap()), vec!["A", "B"]);
        assert_eq!(names(abc.contained(12, 25).unwrap()), vec!["B"]);
        assert_eq!(names(abc.contained(0, 24).unwrap()), vec!["A"]);
        assert!(abc.contained(11, 19).unwrap().is_empty());
    }

    #[rstest]
    fn test_point_lookup(abc: IntervalTree<StringCodec>) {
        let found = abc.point_lookup(&spliced(&[(15, 25)])).unwrap().unwrap();
        assert_eq!(found.payload, "B");
        assert_eq!(found.interval, spliced(&[(15, 25)]));

        assert!(abc.point_lookup(&spliced(&[(15, 24)])).unwrap().is_none());
        assert!(abc.point_lookup(&spliced(&[(15, 25), (30, 40)])).unwrap().is_none());
        assert!(abc.point_lookup(&spliced(&[(15, 5000)])).unwrap().is_none());
    }

    #[rstest]
    fn test_full_scan_in_insertion_order(abc: IntervalTree<StringCodec>) {
        let records: Vec<Record<String>> = abc.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(names(records.clone()), vec!["A", "B", "C"]);
        assert_eq!(records[0].pointer, 0);
        assert_eq!(abc.record_at(records[2].pointer).unwrap(), records[2]);
    }

    #[rstest]
    fn test_header(abc: IntervalTree<StringCodec>) {
        let header = abc.header().unwrap();
        assert_eq!(header.mode, PayloadMode::Internal);
        assert_eq!(header.interval_count, 3);
        assert_eq!(header.max, 128);
    }

    #[rstest]
    fn test_inverted_query_is_rejected(abc: IntervalTree<StringCodec>) {
        assert!(matches!(
            abc.overlapping(30, 10),
            Err(TreeError::InvalidQuery { start: 30, end: 10 })
        ));
    }

    #[rstest]
    fn test_spliced_regions_match_on_parts_only() {
        let tree = build_tree(
            &[
                (spliced(&[(1000, 1100), (5000, 5100)]), "tx"),
                (spliced(&[(2000, 2100)]), "inside-intron"),
            ],
            BuilderConfig::default(),
        );
        // query falls in the intron of tx
        assert_eq!(names(tree.overlapping(2000, 2050).unwrap()), vec!["inside-intron"]);
        assert_eq!(names(tree.overlapping(5050, 5060).unwrap()), vec!["tx"]);
        assert_eq!(names(tree.contained(900, 6000).unwrap()), vec!["tx", "inside-intron"]);
        assert_eq!(names(tree.contained(1000, 5099).unwrap()), vec!["inside-intron"]);
    }

    #[rstest]
    #[case(&[(1000, 1100), (2500, 2700), (4700, 5000)])]
    #[case(&[(10, 11), (12, 13), (14, 15)])]
    #[case(&[(0, 1), (1 << 20, (1 << 20) + 5), (1 << 29, 1 << 30)])]
    fn test_three_part_region_is_one_record(#[case] parts: &[(u32, u32)]) {
        let interval = spliced(parts);
        let mut builder = TreeBuilder::new(StringCodec, BuilderConfig::default()).unwrap();
        builder.add(&interval, &"tx".to_string()).unwrap();
        let mut out = Cursor::new(Vec::new());
        let stats = builder.build(&mut out).unwrap();

        assert!((1..=3).contains(&stats.node_count), "{} nodes", stats.node_count);
        assert_eq!(stats.interval_count, 1);

        let tree = IntervalTree::new(view_of(out.into_inner()), StringCodec);
        assert_eq!(tree.iter().unwrap().count(), 1);
        for part in interval.parts() {
            let hits = tree.overlapping(part.start, part.end).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].interval, interval);
            assert_eq!(hits[0].payload, "tx");
        }
    }

    #[rstest]
    fn test_duplicates_are_kept_and_lookup_returns_first() {
        let tree = build_tree(
            &[
                (spliced(&[(50, 60)]), "first"),
                (spliced(&[(50, 60)]), "second"),
            ],
            BuilderConfig::default(),
        );
        assert_eq!(names(tree.overlapping(55, 56).unwrap()), vec!["first", "second"]);
        assert_eq!(tree.point_lookup(&spliced(&[(50, 60)])).unwrap().unwrap().payload, "first");
    }

    #[rstest]
    fn test_degenerate_region_at_zero() {
        let tree = build_tree(
            &[(spliced(&[(0, 0)]), "zero"), (spliced(&[(0, 40)]), "wide")],
            BuilderConfig::default(),
        );
        assert_eq!(tree.point_lookup(&spliced(&[(0, 0)])).unwrap().unwrap().payload, "zero");
        assert_eq!(tree.reader().overlapping_pointers(0, 0).unwrap().len(), 2);
        assert_eq!(names(tree.contained(0, 0).unwrap()), vec!["zero"]);
    }

    #[rstest]
    fn test_empty_tree() {
        let tree = build_tree(&[], BuilderConfig::default());
        assert!(tree.overlapping(0, 100).unwrap().is_empty());
        assert!(tree.contained(0, 100).unwrap().is_empty());
        assert!(tree.point_lookup(&spliced(&[(0, 0)])).unwrap().is_none());
        assert_eq!(tree.iter().unwrap().count(), 0);
    }

    #[rstest]
    fn test_external_pointers() {
        let mut builder = ExternalTreeBuilder::new(BuilderConfig::default());
        builder.add(&spliced(&[(10, 20)]), 7_000).unwrap();
        builder.add(&spliced(&[(15, 25), (40, 50)]), 3).unwrap();
        let mut out = Cursor::new(Vec::new());
        builder.build(&mut out).unwrap();

        let reader = TreeReader::new(view_of(out.into_inner()));
        assert_eq!(reader.header().unwrap().mode, PayloadMode::External);
        assert_eq!(reader.overlapping_pointers(18, 19).unwrap(), vec![3, 7_000]);
        assert_eq!(reader.overlapping_pointers(45, 45).unwrap(), vec![3]);
        // closed semantics at the pointer level
        assert_eq!(reader.overlapping_pointers(25, 30).unwrap(), vec![3]);

        let tree = IntervalTree::<UnitCodec>::new(reader.view().clone(), UnitCodec);
        assert!(matches!(tree.iter(), Err(TreeError::PayloadNotManaged)));
    }

    #[rstest]
    fn test_bad_magic() {
        let mut bytes = b"NOPE".to_vec();
        bytes.resize(HEADER_SIZE as usize, 0);
        let reader = TreeReader::new(view_of(bytes));
        assert!(matches!(reader.header(), Err(TreeError::BadMagic(m)) if &m == b"NOPE"));
        assert!(reader.overlapping_pointers(0, 10).is_err());
    }

    #[rstest]
    fn test_short_header() {
        let reader = TreeReader::new(view_of(EXTERNAL_MAGIC.to_vec()));
        assert!(matches!(reader.header(), Err(TreeError::CorruptHeader(_))));
    }

    #[rstest]
    fn test_truncated_tree() {
        let mut builder = ExternalTreeBuilder::new(BuilderConfig::default());
        builder.add(&spliced(&[(10, 20)]), 1).unwrap();
        let mut out = Cursor::new(Vec::new());
        builder.build(&mut out).unwrap();
        let mut bytes = out.into_inner();
        bytes.truncate(bytes.len() - 2);

        let reader = TreeReader::new(view_of(bytes));
        assert!(matches!(reader.header(), Err(TreeError::CorruptHeader(_))));
    }

    #[rstest]
    fn test_concurrent_first_queries_share_one_header() {
        let tree = build_tree(&[(spliced(&[(10, 20)]), "A")], BuilderConfig::default());
        let headers: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        assert_eq!(tree.overlapping(0, 100).unwrap().len(), 1);
                        tree.header().unwrap() as *const TreeHeader as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(headers.windows(2).all(|w| w[0] == w[1]));
    }

    fn random_region(rng: &mut StdRng, limit: u32) -> SplicedInterval {
        let num_parts = rng.random_range(1..=3);
        let mut boundaries: Vec<u32> = (0..num_parts * 2).map(|_| rng.random_range(0..limit)).collect();
        boundaries.sort();
        SplicedInterval::from_boundaries(&boundaries).unwrap()
    }

    #[rstest]
    #[case(1, usize::MAX)]
    #[case(2, 7)]
    #[case(3, 1)]
    fn test_matches_brute_force(#[case] seed: u64, #[case] spill_threshold: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let limit = 5_000;
        let regions: Vec<(SplicedInterval, String)> = (0..400)
            .map(|i| (random_region(&mut rng, limit), i.to_string()))
            .collect();

        let mut builder = TreeBuilder::new(
            StringCodec,
            BuilderConfig::default().with_spill_threshold(spill_threshold),
        )
        .unwrap();
        for (interval, name) in &regions {
            builder.add(interval, name).unwrap();
        }
        let mut out = Cursor::new(Vec::new());
        builder.build(&mut out).unwrap();
        let tree = IntervalTree::new(view_of(out.into_inner()), StringCodec);

        for _ in 0..200 {
            let a = rng.random_range(0..limit + 100);
            let b = rng.random_range(0..limit + 100);
            let (start, end) = (a.min(b), a.max(b));

            let expected: Vec<String> = regions
                .iter()
                .filter(|(interval, _)| interval.overlaps(start, end))
                .map(|(_, name)| name.clone())
                .collect();
            assert_eq!(names(tree.overlapping(start, end).unwrap()), expected, "overlap [{start}, {end})");

            let expected: Vec<String> = regions
                .iter()
                .filter(|(interval, _)| interval.contained_in(start, end))
                .map(|(_, name)| name.clone())
                .collect();
            assert_eq!(names(tree.contained(start, end).unwrap()), expected, "contained [{start}, {end}]");
        }

        for (interval, _) in regions.iter().take(50) {
            let expected = regions.iter().find(|(candidate, _)| candidate == interval).map(|(_, n)| n.clone());
            let found = tree.point_lookup(interval).unwrap().map(|r| r.payload);
            assert_eq!(found, expected);
        }
    }

    #[rstest]
    fn test_pointer_queries_match_closed_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut builder = ExternalTreeBuilder::new(BuilderConfig::default());
        let regions: Vec<SplicedInterval> = (0..300).map(|_| random_region(&mut rng, 2_000)).collect();
        for (i, interval) in regions.iter().enumerate() {
            builder.add(interval, i as u64).unwrap();
        }
        let mut out = Cursor::new(Vec::new());
        builder.build(&mut out).unwrap();
        let reader = TreeReader::new(view_of(out.into_inner()));

        for _ in 0..200 {
            let a = rng.random_range(0..2_100);
            let b = rng.random_range(0..2_100);
            let (left, right) = (a.min(b), a.max(b));
            let expected: Vec<u64> = regions
                .iter()
                .enumerate()
                .filter(|(_, r)| r.parts().iter().any(|p| p.start <= right && p.end >= left))
                .map(|(i, _)| i as u64)
                .collect();
            assert_eq!(reader.overlapping_pointers(left, right).unwrap(), expected);
        }
    }
}
