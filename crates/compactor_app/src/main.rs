//! `compactor`: compress an extracted chat conversation through the
//! Anthropic Messages API and write the result as markdown.

mod commands;
mod config;
mod logging;
mod observer;
mod source;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::CompactorSettings;
use crate::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "compactor")]
#[command(about = "Compress extracted chat conversations into compact markdown", long_about = None)]
pub struct Cli {
    /// Settings file (RON). Defaults to ./compactor.ron when present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where log lines go.
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Compress a conversation and export the result.
    Compress {
        /// Conversation JSON produced by the page extractor.
        input: PathBuf,
        /// Token budget per chunk.
        #[arg(long, value_name = "N")]
        chunk_size: Option<u32>,
        /// Directory for the exported markdown.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// API key; overrides ANTHROPIC_API_KEY and the settings file.
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
    },

    /// Export the conversation as a plain markdown transcript, no compression.
    Extract {
        /// Conversation JSON produced by the page extractor.
        input: PathBuf,
        /// Directory for the exported markdown.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Check that the API key is accepted.
    Verify {
        /// API key; overrides ANTHROPIC_API_KEY and the settings file.
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::initialize(cli.log, logging::level_for(cli.verbose));

    if let Err(err) = run(cli).await {
        log::error!("{:#}", err);
        eprintln!("compactor error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = CompactorSettings::load(cli.config.as_deref())?;

    match cli.command {
        CliCommand::Compress {
            input,
            chunk_size,
            output_dir,
            api_key,
        } => {
            if let Some(chunk_size) = chunk_size {
                settings.chunk_size_tokens = chunk_size;
            }
            if let Some(dir) = output_dir {
                settings.output_dir = dir;
            }
            commands::run_compress(&settings, &input, api_key.as_deref()).await
        }
        CliCommand::Extract { input, output_dir } => {
            if let Some(dir) = output_dir {
                settings.output_dir = dir;
            }
            commands::run_extract(&settings, &input)
        }
        CliCommand::Verify { api_key } => {
            commands::run_verify(&settings, api_key.as_deref()).await
        }
    }
}
