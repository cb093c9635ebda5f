// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Greenroom - multi-process conversation coordination with reply previews.
//!
//! This is the binary entry point for a Greenroom worker process.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod generator;
mod serve;
mod shell;

/// Greenroom - multi-process conversation coordination with reply previews.
#[derive(Parser, Debug)]
#[command(name = "greenroom", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a Greenroom worker process.
    Serve,
    /// Launch an interactive REPL session.
    Shell,
    /// Validate and print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match greenroom_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            greenroom_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Shell) => shell::run_shell(config).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("greenroom: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Pretty-prints the merged configuration as TOML.
fn print_config(config: &greenroom_config::GreenroomConfig) -> Result<(), greenroom_core::GreenroomError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| greenroom_core::GreenroomError::Internal(format!("config render failed: {e}")))?;
    print!("{rendered}");
    Ok(())
}
