#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

mod inspect;
mod play;

use std::{error::Error, fs::File, io::BufReader, path::Path};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hlstudio_mdl::Asset;
use inspect::{inspect, Inspect};
use play::{play, Play};

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Print the tables of a model
    Inspect(Inspect),
    /// Simulate playing a sequence and print frames and events
    Play(Play),
}

fn read_asset(path: &Path) -> Result<Asset, Box<dyn Error>> {
    let file = File::open(path)?;
    Ok(Asset::read(BufReader::new(file))?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Inspect(opts) => inspect(&opts),
        SubCommand::Play(opts) => play(&opts),
    }
}
