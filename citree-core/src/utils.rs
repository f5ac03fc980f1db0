use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

use crate::consts::{BED12_COLUMNS, GZ_FILE_EXTENSION};
use crate::errors::RegionError;
use crate::models::{Interval, Region, SplicedInterval};

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new(GZ_FILE_EXTENSION));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    let reader = BufReader::new(file);

    Ok(reader)
}

/// Get a reader for either a gzipped, non-gzipped file, or stdin
///
/// # Arguments
///
/// - file_path: path to the file to read, or '-' for stdin
///
/// # Returns
///
/// A `BufReader` object for a given file path or stdin.
pub fn get_dynamic_reader_w_stdin(file_path_str: &str) -> Result<BufReader<Box<dyn Read>>> {
    if file_path_str == "-" {
        Ok(BufReader::new(Box::new(std::io::stdin()) as Box<dyn Read>))
    } else {
        let file_path = Path::new(file_path_str);
        get_dynamic_reader(file_path)
    }
}

/// True for lines that carry no region: blank lines, comments, track and browser lines.
pub fn is_header_line(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, name: &str, line: &str) -> Result<T, RegionError> {
    field
        .and_then(|s| s.trim().parse::<T>().ok())
        .ok_or_else(|| RegionError::RegionParseError(format!("invalid {} in line: {:?}", name, line)))
}

fn parse_block_list(field: &str, line: &str) -> Result<Vec<u32>, RegionError> {
    field
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_field::<u32>(Some(s), "block list", line))
        .collect()
}

///
/// Parse one line of a BED-like file into a [`Region`].
///
/// Lines with at least twelve columns are read as BED12: the block columns
/// become the parts of a spliced region and `rest` keeps columns 4..9.
/// Shorter lines become single-part regions with every column past the
/// third kept in `rest`. Returns `Ok(None)` for header and comment lines.
///
pub fn parse_bed_line(line: &str) -> Result<Option<Region>, RegionError> {
    if is_header_line(line) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if fields.len() < 3 {
        return Err(RegionError::RegionParseError(format!(
            "expected at least 3 columns: {:?}",
            line
        )));
    }

    let chr = fields[0].to_string();
    let start: u32 = parse_field(fields.get(1).copied(), "start", line)?;
    let end: u32 = parse_field(fields.get(2).copied(), "end", line)?;

    if fields.len() >= BED12_COLUMNS {
        let block_count: usize = parse_field(fields.get(9).copied(), "blockCount", line)?;
        let sizes = parse_block_list(fields[10], line)?;
        let offsets = parse_block_list(fields[11], line)?;
        if sizes.len() != block_count || offsets.len() != block_count {
            return Err(RegionError::RegionParseError(format!(
                "blockCount does not match block lists: {:?}",
                line
            )));
        }

        let parts = offsets
            .iter()
            .zip(sizes.iter())
            .map(|(offset, size)| {
                let part_start = start.checked_add(*offset);
                match part_start.and_then(|s| s.checked_add(*size).map(|e| (s, e))) {
                    Some((s, e)) => Ok(Interval::new(s, e)),
                    None => Err(RegionError::RegionParseError(format!(
                        "block past the end of the coordinate range: {:?}",
                        line
                    ))),
                }
            })
            .collect::<Result<Vec<_>, RegionError>>()?;
        let interval = SplicedInterval::new(parts)?;
        let rest = Some(fields[3..9].join("\t")).filter(|s| !s.is_empty());

        return Ok(Some(Region { chr, interval, rest }));
    }

    let interval = SplicedInterval::single(start, end)?;
    let rest = Some(fields[3..].join("\t")).filter(|s| !s.is_empty());

    Ok(Some(Region { chr, interval, rest }))
}
