// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! fnshell CLI
//!
//! Interactive shell for invoking locally emulated functions.

use clap::{Parser, Subcommand};
use fnshell_core::ShellOptions;

mod commands;
mod emulator;
mod gateway;

/// fnshell - Interactive shell for emulated functions
#[derive(Parser)]
#[command(name = "fnshell")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the functions emulator and open an interactive shell
    Shell {
        /// Port for the functions emulator
        #[arg(short, long, default_value = "5001")]
        port: String,

        /// Project the emulators belong to
        #[arg(long)]
        project: Option<String>,

        /// Enable the function debugger, optionally on a specific port
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        inspect_functions: Option<String>,

        /// Path to the function manifest
        #[arg(short, long, default_value = "fnshell.yaml")]
        manifest: String,
    },

    /// Validate a function manifest
    Validate {
        /// Path to the manifest file
        file: String,
    },

    /// List emulators registered with the hub
    Emulators {
        /// Project the emulators belong to
        #[arg(long)]
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Shell {
            port,
            project,
            inspect_functions,
            manifest,
        } => {
            let options = ShellOptions {
                port,
                inspect_functions,
                project,
            };
            commands::shell::execute(options, &manifest).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::Emulators { project } => commands::emulators::execute(&project).await,
    }
}
