mod cli;
mod opts;

use anyhow::Result;
use clap::Parser;
use opts::{Fcosup, SubCommands};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Fcosup::parse();

    if opts.verbose {
        env::set_var("RUST_LOG", "debug");
    } else if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    match opts.command {
        SubCommands::Deploy(deploy) => cli::deploy(deploy).await,
        SubCommands::Remove(remove) => cli::remove(remove).await,
    }
}
