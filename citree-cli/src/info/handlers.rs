use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;

use citree_tree::{MultiTreeReader, PayloadCodec};

use crate::db::Database;

pub fn run_info(matches: &ArgMatches) -> Result<()> {
    let db = matches
        .get_one::<String>("db")
        .expect("A path to a citree container is required.");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match Database::open(Path::new(db))? {
        Database::Plain(reader) => describe_database(&reader, &mut out)?,
        Database::Compressed(reader) => describe_database(&reader, &mut out)?,
    }

    Ok(())
}

///
/// Write the container metadata as JSON, followed by one tab-separated line per tree:
/// name, regions, nodes, `max`, and size in bytes.
///
pub fn describe_database<C: PayloadCodec, W: Write>(reader: &MultiTreeReader<C>, out: &mut W) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(reader.metadata())?)?;
    writeln!(out, "#chrom\tregions\tnodes\tmax\tbytes")?;

    for entry in reader.entries() {
        let Some(tree) = reader.tree(&entry.name)? else {
            continue;
        };
        let header = tree.header()?;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            entry.name,
            header.interval_count,
            header.node_count,
            header.max,
            entry.end - entry.start
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use citree_tree::{BuilderConfig, ContainerConfig, ContainerStats};

    use crate::build::handlers::build_container;

    #[rstest]
    fn test_describe_database() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("regions.bed");
        std::fs::write(&bed, "chr1\t10\t20\nchr1\t15\t25\nchr2\t0\t3000\n").unwrap();
        let out = dir.path().join("regions.cti");
        let config = ContainerConfig {
            builder: BuilderConfig::default().with_temp_dir(dir.path()),
            ..Default::default()
        };
        let stats: ContainerStats = build_container(&[bed], &out, config).unwrap();

        let Database::Plain(reader) = Database::open(&out).unwrap() else {
            panic!("expected an uncompressed container");
        };
        let mut buf = Vec::new();
        describe_database(&reader, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("\"payload_type\": \"string\""));
        let rows: Vec<&str> = text.lines().skip_while(|l| !l.starts_with("#chrom")).skip(1).collect();
        assert_eq!(
            rows,
            vec![
                format!("chr1\t2\t{}\t32\t{}", stats.trees[0].1.node_count, stats.trees[0].1.size),
                format!("chr2\t1\t{}\t4096\t{}", stats.trees[1].1.node_count, stats.trees[1].1.size),
            ]
        );
    }
}
