use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const BUILD_CMD: &str = "build";

pub fn create_build_cli() -> Command {
    Command::new(BUILD_CMD)
        .author("Databio")
        .about("Index BED or BED12 files into a single citree container.")
        .arg_required_else_help(true)
        .arg(
            arg!(-i --input <input> "BED file(s) to index, gzipped or not")
                .required(true)
                .num_args(1..),
        )
        .arg(arg!(-o --output <output> "Path of the container to write").required(true))
        .arg(
            Arg::new("temp_dir")
                .long("temp-dir")
                .value_name("DIR")
                .help("Directory for spill and data files (defaults to the system temp dir)"),
        )
        .arg(
            Arg::new("spill_threshold")
                .long("spill-threshold")
                .value_name("PARTS")
                .value_parser(value_parser!(usize))
                .help("Interval parts buffered per reference sequence before spilling to disk"),
        )
        .arg(
            Arg::new("idle_spill_secs")
                .long("idle-spill-secs")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Spill a reference sequence that received nothing for this many seconds"),
        )
        .arg(arg!(--compress "Gzip each stored payload").action(ArgAction::SetTrue))
}
