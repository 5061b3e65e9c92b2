mod cli;
mod config;
mod download;
mod error;
mod normalize;
mod nwm;
mod plot;
mod reading;
mod usgs;
mod zarr;

use std::process::ExitCode;

use clap::Parser;
use cli::{command, Cli};
use config::CompareConfig;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let result = match CompareConfig::from_cli(&cli) {
        Ok(config) => command::compare(&config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(filename) => {
            println!("Plot saved to `{}`", filename);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
