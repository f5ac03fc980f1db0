use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::info;

use citree_core::utils::{get_dynamic_reader_w_stdin, parse_bed_line};
use citree_tree::{MultiTreeReader, PayloadCodec};

use crate::db::{Database, record_to_bed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Records with a part overlapping a part of the query.
    Overlap,
    /// Records lying entirely within the query's span.
    Contained,
    /// The record with exactly the query's parts.
    Exact,
}

impl FromStr for QueryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overlap" => Ok(QueryMode::Overlap),
            "contained" => Ok(QueryMode::Contained),
            "exact" => Ok(QueryMode::Exact),
            _ => Err(anyhow::anyhow!(
                "Invalid query mode: {}. Valid options are 'overlap', 'contained' or 'exact'",
                s
            )),
        }
    }
}

pub fn run_query(matches: &ArgMatches) -> Result<()> {
    let db = matches
        .get_one::<String>("db")
        .expect("A path to a citree container is required.");

    let query = matches
        .get_one::<String>("query")
        .expect("A path to a query file is required.");

    let mode = match matches.get_one::<String>("mode") {
        Some(mode) => QueryMode::from_str(mode)?,
        None => QueryMode::Overlap,
    };

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    let hits = match Database::open(Path::new(db))? {
        Database::Plain(reader) => query_database(&reader, query, mode, &mut writer)?,
        Database::Compressed(reader) => query_database(&reader, query, mode, &mut writer)?,
    };
    writer.flush()?;

    info!("{} hits", hits);
    Ok(())
}

///
/// Run every region of `query` (a path, or `-` for stdin) against `reader` and write
/// the hits to `out` as BED lines. Returns the number of hits written.
///
pub fn query_database<C, W>(
    reader: &MultiTreeReader<C>,
    query: &str,
    mode: QueryMode,
    out: &mut W,
) -> Result<u64>
where
    C: PayloadCodec<Value = String>,
    W: Write,
{
    let lines = get_dynamic_reader_w_stdin(query)?;

    let mut hits = 0;
    for (i, line) in lines.lines().enumerate() {
        let line = line?;
        let Some(region) = parse_bed_line(&line)
            .with_context(|| format!("{}: could not parse line {}", query, i + 1))?
        else {
            continue;
        };

        let records = match mode {
            QueryMode::Overlap => reader.overlapping_region(&region)?,
            QueryMode::Contained => reader.contained(&region.chr, region.start(), region.end())?,
            QueryMode::Exact => reader.point_lookup(&region)?.into_iter().collect(),
        };

        for record in records {
            writeln!(out, "{}", record_to_bed(&region.chr, record))?;
            hits += 1;
        }
    }

    Ok(hits)
}
