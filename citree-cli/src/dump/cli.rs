use clap::{Command, arg};

pub const DUMP_CMD: &str = "dump";

pub fn create_dump_cli() -> Command {
    Command::new(DUMP_CMD)
        .author("Databio")
        .about("Write every region stored in a citree container back out as BED.")
        .arg_required_else_help(true)
        .arg(arg!(-d --db <db> "Container written by `citree build`").required(true))
        .arg(arg!(-c --chrom <chrom> "Only dump this reference sequence"))
}
