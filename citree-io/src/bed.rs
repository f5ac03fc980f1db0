use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use citree_core::models::{Region, RegionSet};
use citree_core::utils::parse_bed_line;

use crate::error::{Result, StoreError};

///
/// Streaming reader over the regions of a BED (or BED12) file.
///
/// Unlike [`RegionSet`], regions are parsed one line at a time so arbitrarily
/// large files can be fed to a builder.
///
pub struct BedReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl BedReader<BufReader<Box<dyn Read>>> {
    /// Open a `.bed` or `.bed.gz` file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let inner: Box<dyn Read> = match path.extension() == Some(OsStr::new("gz")) {
            true => Box::new(MultiGzDecoder::new(file)),
            false => Box::new(file),
        };
        Ok(BedReader::new(BufReader::new(inner)))
    }
}

impl<R: BufRead> BedReader<R> {
    pub fn new(reader: R) -> Self {
        BedReader {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for BedReader<R> {
    type Item = Result<Region>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            match parse_bed_line(&line) {
                Ok(Some(region)) => return Some(Ok(region)),
                Ok(None) => continue,
                Err(source) => {
                    return Some(Err(StoreError::BedLine {
                        line: self.line_number,
                        source,
                    }));
                }
            }
        }
    }
}

pub trait BedWrite {
    ///
    /// Write data to disk as bed file
    ///
    /// # Arguments
    /// - path: the path to the file to dump to
    fn write_bed<T: AsRef<Path>>(&self, path: T) -> std::io::Result<()>;

    ///
    /// Write data to disk as bed.gz file
    ///
    /// # Arguments
    /// - path: the path to the file to dump to
    fn write_bed_gz<T: AsRef<Path>>(&self, path: T) -> std::io::Result<()>;
}

impl BedWrite for RegionSet {
    fn write_bed<T: AsRef<Path>>(&self, path: T) -> std::io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = BufWriter::new(File::create(path)?);

        for region in &self.regions {
            writeln!(file, "{}", region.as_string())?;
        }
        file.flush()
    }

    fn write_bed_gz<T: AsRef<Path>>(&self, path: T) -> std::io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());

        for region in &self.regions {
            writeln!(encoder, "{}", region.as_string())?;
        }

        encoder.finish()?.flush()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn region_set() -> RegionSet {
        let text = "chr1\t10\t20\ta\nchr1\t100\t400\ttx\t0\t+\t100\t400\t0\t2\t50,100,\t0,200,\n";
        let regions = BedReader::new(text.as_bytes())
            .collect::<Result<Vec<Region>>>()
            .unwrap();
        RegionSet::from(regions)
    }

    #[rstest]
    fn test_reader_parses_plain_and_spliced(region_set: RegionSet) {
        assert_eq!(region_set.len(), 2);
        assert_eq!(region_set.regions[0].rest.as_deref(), Some("a"));
        assert!(region_set.regions[1].is_spliced());
        assert_eq!(region_set.regions[1].interval.num_parts(), 2);
    }

    #[rstest]
    fn test_reader_reports_line_number() {
        let text = "# header\nchr1\t1\t2\nchr1\tx\t2\n";
        let results: Vec<Result<Region>> = BedReader::new(text.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(StoreError::BedLine { line: 3, .. })));
    }

    #[rstest]
    fn test_save_bed_round_trip(region_set: RegionSet) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("out").join("regions.bed");

        region_set.write_bed(&path).unwrap();

        let reread = BedReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<Region>>>()
            .unwrap();
        assert_eq!(reread, region_set.regions);
    }

    #[rstest]
    fn test_save_bed_gz_round_trip(region_set: RegionSet) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("regions.bed.gz");

        region_set.write_bed_gz(&path).unwrap();

        let reread = BedReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<Region>>>()
            .unwrap();
        assert_eq!(reread, region_set.regions);
    }
}
