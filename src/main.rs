use std::{io, path::PathBuf, process};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod collection;
mod config;
mod filter;
mod kismet;
mod map;
mod model;
mod normalize;
mod output;
mod wigle;

#[derive(Debug, Parser)]
#[command(version, about = "Turn wardriving captures into GeoJSON and interactive maps")]
struct Cli {
    /// TOML file overriding key lists, palette and map settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert a WiGLE CSV export into a GeoJSON FeatureCollection
    Csv { input: PathBuf, output: PathBuf },
    /// Convert Kismet netxml files (paths or glob patterns) into CSV and GeoJSON
    Netxml {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Render GeoJSON as a self-contained HTML map
    Map(map::MapArgs),
}

fn main() -> Result<()> {
    // usage errors exit with 1, help and version with 0
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        process::exit(code);
    });

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = match cli.config.as_deref() {
        Some(path) => config::load(path)?,
        None => config::Config::default(),
    };

    match cli.command {
        Command::Csv { input, output } => wigle::run(&input, &output, &config.ingest)?,
        Command::Netxml { paths } => kismet::run(&paths)?,
        Command::Map(args) => map::run(&args, &config)?,
    };

    Ok(())
}
