use clap::{Command, arg};

pub const QUERY_CMD: &str = "query";

pub fn create_query_cli() -> Command {
    Command::new(QUERY_CMD)
        .author("Databio")
        .about("Look up the regions of a BED file in a citree container.")
        .arg_required_else_help(true)
        .arg(arg!(-d --db <db> "Container written by `citree build`").required(true))
        .arg(arg!(-q --query <query> "BED file of query regions, or - for stdin").required(true))
        .arg(
            arg!(-m --mode <mode> "overlap, contained or exact (default: overlap)")
                .value_parser(["overlap", "contained", "exact"]),
        )
}
