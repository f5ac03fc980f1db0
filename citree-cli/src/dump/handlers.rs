use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;

use citree_tree::{MultiTreeReader, PayloadCodec};

use crate::db::{Database, record_to_bed};

pub fn run_dump(matches: &ArgMatches) -> Result<()> {
    let db = matches
        .get_one::<String>("db")
        .expect("A path to a citree container is required.");
    let chrom = matches.get_one::<String>("chrom").map(String::as_str);

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    match Database::open(Path::new(db))? {
        Database::Plain(reader) => dump_database(&reader, chrom, &mut writer)?,
        Database::Compressed(reader) => dump_database(&reader, chrom, &mut writer)?,
    };
    writer.flush()?;

    Ok(())
}

///
/// Write the records of `chrom` (or of every reference sequence, in directory order)
/// to `out`, each sequence in insertion order. Returns the number of records written.
///
pub fn dump_database<C, W>(reader: &MultiTreeReader<C>, chrom: Option<&str>, out: &mut W) -> Result<u64>
where
    C: PayloadCodec<Value = String>,
    W: Write,
{
    let chroms: Vec<&str> = match chrom {
        Some(chrom) => vec![chrom],
        None => reader.chroms().collect(),
    };

    let mut written = 0;
    for chr in chroms {
        let Some(records) = reader.iter_chrom(chr)? else {
            anyhow::bail!("Reference sequence {} is not in the container", chr);
        };
        for record in records {
            writeln!(out, "{}", record_to_bed(chr, record?))?;
            written += 1;
        }
    }

    Ok(written)
}
