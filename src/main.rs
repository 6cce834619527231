mod amazon;
mod cli;
mod codec;
mod error;
mod fields;
mod fmt;
mod journal;
mod models;
mod ofx;
mod reader;
mod settings;
mod subst;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("CSV2OFX_LOG").unwrap_or_else(|_| EnvFilter::new("csv2ofx=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Convert(args) => cli::convert::run(&args),
        Commands::Issuers { conf } => cli::issuers::run(conf.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
