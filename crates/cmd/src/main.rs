// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cmd::commands::{LoadArgs, describe_command, load_command};
use std::path::PathBuf;
use upload::{Upload, UploadConfig, load_config};
use votstream::LimitUnit;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "tapload")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Upload configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Enable verbose output (info level unless TAPLOAD_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the columns of each document
    Describe {
        /// Documents to read, as LABEL=PATH
        #[arg(required = true, value_parser = Upload::parse_arg)]
        uploads: Vec<Upload>,
    },
    /// Upload documents and print the stored tables
    Load(LoadCommand),
}

#[derive(Args)]
struct LoadCommand {
    /// Documents to upload, as LABEL=PATH
    #[arg(required = true, value_parser = Upload::parse_arg)]
    uploads: Vec<Upload>,
    /// Count the quota in rows or bytes
    #[arg(long)]
    limit_unit: Option<LimitUnit>,
    /// Largest number of rows or bytes per table
    #[arg(long)]
    limit: Option<u64>,
}

#[allow(clippy::print_stdout)]
fn print_output(output: &str) {
    print!("{output}");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        diagnostics::init_diagnostics_with_default("info");
    } else {
        diagnostics::init_diagnostics();
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => UploadConfig::default(),
    };

    match &cli.command {
        Commands::Describe { uploads } => describe_command(&config, uploads, print_output),
        Commands::Load(args) => {
            let overrides = LoadArgs {
                limit_unit: args.limit_unit,
                limit: args.limit,
            };
            load_command(&config, &args.uploads, &overrides, print_output)
        }
    }
}
