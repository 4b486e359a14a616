use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

use tidewatch::{core::config::RootConfig, prelude::Error};

mod common;
mod daemon;
#[cfg(feature = "utils")]
mod list;
mod probe;
mod sweep;
mod track;
mod untrack;

#[derive(Debug, Subcommand)]
enum Command {
    /// Sweep the pending set periodically until interrupted
    Daemon(daemon::Args),

    /// Run a single sweep and print what happened
    Sweep(sweep::Args),

    /// Add a broadcast tx to the pending set
    Track(track::Args),

    /// Drop a tx from the pending set
    Untrack(untrack::Args),

    /// Show the pending set
    #[cfg(feature = "utils")]
    List(list::Args),

    /// Check a single tx against the node once
    Probe(probe::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "Tidewatch")]
#[clap(bin_name = "tidewatch")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(explicit_file: &Option<PathBuf>) -> Result<RootConfig, config::ConfigError> {
    let mut s = config::Config::builder();

    // our base config will always be in /etc/tidewatch
    s = s.add_source(config::File::with_name("/etc/tidewatch/daemon.toml").required(false));

    // but we can override it by having a file in the working dir
    s = s.add_source(config::File::with_name("tidewatch.toml").required(false));

    // if an explicit file was passed, then we load it as mandatory
    if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
        s = s.add_source(config::File::with_name(explicit).required(true));
    }

    // finally, we use env vars to make some last-step overrides
    s = s.add_source(
        config::Environment::with_prefix("TIDEWATCH")
            .prefix_separator("_")
            .separator("__"),
    );

    s.build()?.try_deserialize()
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args.config).map_err(Error::config)?;

    match args.command {
        Command::Daemon(x) => daemon::run(config, &x)?,
        Command::Sweep(x) => sweep::run(&config, &x)?,
        Command::Track(x) => track::run(&config, &x)?,
        Command::Untrack(x) => untrack::run(&config, &x)?,
        #[cfg(feature = "utils")]
        Command::List(x) => list::run(&config, &x)?,
        Command::Probe(x) => probe::run(&config, &x)?,
    };

    Ok(())
}
