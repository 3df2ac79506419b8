//! wasmdev - live build-and-serve tool for Go WebAssembly projects.

#![allow(dead_code)]

mod cli;
mod config;
mod deploy;
mod hashtree;
mod livebuild;
mod logger;
mod project;
mod server;
mod toolchain;
mod utils;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::{Action, Cli};
use config::AppConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_verbose(cli.debug);

    let config = AppConfig::resolve(&cli)?;

    match &cli.action {
        Action::Build => cli::run_build(&config),
        Action::Serve => cli::run_serve(&config),
        Action::Clean => cli::run_clean(&config),
        Action::DeploySftp(args) => cli::run_deploy(args),
    }
}
