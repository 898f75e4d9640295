use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

use kdash::commands;
use kdash::core::Config;

fn main() -> Result<()> {
    let matches = Command::new("kdash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cached vulnerability scans and host metrics for the cluster dashboard")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON config file (defaults to <config dir>/kdash/config.json)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("scan")
                .about("Scan container images for vulnerabilities")
                .arg(
                    Arg::new("images")
                        .value_name("IMAGE")
                        .help("Image references, e.g. nginx:1.25")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Bypass the scan cache")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .value_parser(["summary", "json", "csv"])
                        .default_value("summary"),
                )
                .arg(
                    Arg::new("show-cache")
                        .long("show-cache")
                        .help("Print scan cache information afterwards")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("invalidate")
                        .long("invalidate")
                        .value_name("IMAGE|all")
                        .help("Evict one image (or all) from the cache after scanning"),
                ),
        )
        .subcommand(
            Command::new("metrics")
                .about("Show current host metrics")
                .arg(
                    Arg::new("samples")
                        .short('n')
                        .long("samples")
                        .value_name("N")
                        .help("Number of readings to take")
                        .value_parser(value_parser!(u64))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .short('i')
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Delay between readings")
                        .value_parser(value_parser!(u64))
                        .default_value("1000"),
                )
                .arg(
                    Arg::new("history")
                        .long("history")
                        .help("Print the collected history at the end")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print JSON instead of text")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export a saved scan result")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Scan entry JSON, as written by `kdash scan --format json`")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Export format: json or csv")
                        .default_value("json"),
                ),
        )
        .get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    }
    .from_env()
    .context("Invalid configuration")?;

    kdash::init_logging(&config.log_level);
    log::debug!("Using configuration: {:?}", config);

    match matches.subcommand() {
        Some(("scan", sub_matches)) => commands::scan(sub_matches, &config),
        Some(("metrics", sub_matches)) => commands::metrics(sub_matches, &config),
        Some(("export", sub_matches)) => commands::export(sub_matches),
        _ => {
            println!("Use 'kdash --help' for more information.");
            Ok(())
        }
    }
}
