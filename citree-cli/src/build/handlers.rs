use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;

use citree_io::BedReader;
use citree_tree::consts::DEFAULT_SPILL_THRESHOLD;
use citree_tree::{
    BuilderConfig, ContainerConfig, ContainerStats, GzipCodec, MultiTreeBuilder, PayloadCodec,
    StringCodec,
};

use crate::consts::VERSION;

pub fn run_build(matches: &ArgMatches) -> Result<()> {
    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("input")
        .expect("At least one BED file is required.")
        .map(PathBuf::from)
        .collect();

    let output = matches
        .get_one::<String>("output")
        .expect("An output path is required.");

    let spill_threshold = matches
        .get_one::<usize>("spill_threshold")
        .copied()
        .unwrap_or(DEFAULT_SPILL_THRESHOLD);

    let mut builder = BuilderConfig::default().with_spill_threshold(spill_threshold);
    if let Some(dir) = matches.get_one::<String>("temp_dir") {
        builder = builder.with_temp_dir(dir);
    }

    let config = ContainerConfig {
        builder,
        idle_spill: matches
            .get_one::<u64>("idle_spill_secs")
            .map(|secs| Duration::from_secs(*secs)),
        compressed: matches.get_flag("compress"),
        ..Default::default()
    };

    let stats = build_container(&inputs, Path::new(output), config)?;
    println!(
        "{}\t{} regions\t{} reference sequences\t{} bytes",
        output,
        stats.interval_count(),
        stats.trees.len(),
        stats.size
    );

    Ok(())
}

///
/// Index every region of `inputs` into a container at `output`.
///
/// Payloads are the columns after the coordinates. The input paths and the tool
/// version are recorded in the container metadata.
///
pub fn build_container(
    inputs: &[PathBuf],
    output: &Path,
    mut config: ContainerConfig,
) -> Result<ContainerStats> {
    let names: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
    config.info.insert("inputs".to_string(), json!(names));
    config.info.insert("citree_version".to_string(), json!(VERSION));

    if config.compressed {
        let builder = MultiTreeBuilder::new(output, GzipCodec::new(StringCodec), config);
        index_files(inputs, builder)
    } else {
        let builder = MultiTreeBuilder::new(output, StringCodec, config);
        index_files(inputs, builder)
    }
}

fn index_files<C: PayloadCodec<Value = String>>(
    inputs: &[PathBuf],
    mut builder: MultiTreeBuilder<C>,
) -> Result<ContainerStats> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} regions)")?,
    );

    for input in inputs {
        pb.set_message(format!("Indexing {}", input.display()));
        let reader = BedReader::open(input)
            .with_context(|| format!("Failed to open BED file: {}", input.display()))?;

        for region in reader {
            let region =
                region.with_context(|| format!("Failed to read BED file: {}", input.display()))?;
            let payload = region.rest.clone().unwrap_or_default();
            builder
                .add_region(&region, &payload)
                .with_context(|| format!("Failed to index {} from {}", region.chr, input.display()))?;
            pb.inc(1);
        }
    }
    pb.finish_and_clear();

    let stats = builder.finish()?;
    info!(
        "Indexed {} regions on {} reference sequences ({} bytes)",
        stats.interval_count(),
        stats.trees.len(),
        stats.size
    );

    Ok(stats)
}
