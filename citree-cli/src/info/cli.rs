use clap::{Command, arg};

pub const INFO_CMD: &str = "info";

pub fn create_info_cli() -> Command {
    Command::new(INFO_CMD)
        .author("Databio")
        .about("Show the metadata and per-sequence tree statistics of a citree container.")
        .arg_required_else_help(true)
        .arg(arg!(-d --db <db> "Container written by `citree build`").required(true))
}
