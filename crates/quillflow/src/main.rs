//! Quillflow launcher.
//!
//! The pipeline engine is a library; this binary wires it to an
//! in-memory store and a scripted generation service for an
//! end-to-end demonstration, streaming the wire frames a real
//! transport would carry.

use anyhow::Result;
use clap::{Parser, Subcommand};
use quillflow_logging::{init_logging, LogConfig};
use std::process::ExitCode;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "quillflow", about = "Chat-assisted document pipeline")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scripted end-to-end pipeline, printing wire frames
    Demo,
    /// Print the fixed stage order and the documents each stage owns
    Stages,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "quillflow",
        verbose: args.verbose,
        log_to_file: false,
    }) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    let result: Result<()> = match args.command {
        Command::Demo => cli::demo::run().await,
        Command::Stages => cli::stages::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
