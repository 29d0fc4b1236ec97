#![allow(dead_code)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use crate::ingest::Ingest;
use crate::store::Store;

mod domain;
mod event_file;
mod ingest;
mod store;
mod util;

const ABOUT: &str = "Builds an in-memory sabermetric baseball database from raw Retrosheet files.";

#[derive(Parser, Debug)]
#[command(name = "sabredb", about = ABOUT)]
struct Opt {
    /// Root of the Retrosheet directory tree.
    #[arg(short, long)]
    input: PathBuf,

    /// Season to ingest; repeatable. All seasons when omitted.
    #[arg(short, long = "year")]
    years: Vec<u16>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    let level = if opt.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
        return ExitCode::FAILURE;
    }

    let mut store = Store::new();
    let mut ingest = Ingest::new(&opt.input);
    ingest.restrict_years(&opt.years);

    match ingest.parse(&mut store) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ingestion failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
