//! Runs the metric reporters configured for a process until it is asked to stop.

pub mod cli;
pub mod demo;
pub mod flags;

use clap::Parser;

fn main() {
    if let Err(err) = cli::Cli::parse().run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
