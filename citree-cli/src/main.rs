mod build;
mod db;
mod dump;
mod info;
mod query;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "citree";
    pub const BIN_NAME: &str = "citree";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Build and query disk-resident interval trees over genomic regions, spliced ones included.")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("More logging: -v for info, -vv for debug"),
        )
        .subcommand(build::cli::create_build_cli())
        .subcommand(query::cli::create_query_cli())
        .subcommand(dump::cli::create_dump_cli())
        .subcommand(info::cli::create_info_cli())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(matches.get_count("verbose"));

    match matches.subcommand() {
        //
        // BUILD
        //
        Some((build::cli::BUILD_CMD, matches)) => {
            build::handlers::run_build(matches)?;
        }

        //
        // QUERY
        //
        Some((query::cli::QUERY_CMD, matches)) => {
            query::handlers::run_query(matches)?;
        }

        //
        // DUMP
        //
        Some((dump::cli::DUMP_CMD, matches)) => {
            dump::handlers::run_dump(matches)?;
        }

        //
        // INFO
        //
        Some((info::cli::INFO_CMD, matches)) => {
            info::handlers::run_info(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_parser_is_well_formed() {
        build_parser().debug_assert();
    }

    #[rstest]
    #[case(&["citree", "info", "-d", "x.cti"], 0)]
    #[case(&["citree", "-v", "info", "-d", "x.cti"], 1)]
    #[case(&["citree", "info", "-d", "x.cti", "-vv"], 2)]
    fn test_verbosity_is_global(#[case] args: &[&str], #[case] expected: u8) {
        let matches = build_parser().try_get_matches_from(args).unwrap();
        assert_eq!(matches.get_count("verbose"), expected);
    }

    #[rstest]
    fn test_build_requires_output() {
        let result = build_parser().try_get_matches_from(["citree", "build", "-i", "a.bed"]);
        assert!(result.is_err());
    }
}
