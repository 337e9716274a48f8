// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VICW - a virtual infinite context window for chat sessions.
//!
//! This is the binary entry point: it loads configuration, wires the
//! engine, and serves the HTTP API.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;

/// VICW - bounded-prompt middleware with offloaded long-term memory.
#[derive(Parser, Debug)]
#[command(name = "vicw", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the VICW server.
    Serve,
    /// Load and validate the configuration, then exit.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> vicw_config::VicwConfig {
    let result = match path {
        Some(path) => vicw_config::load_config_from_path(path),
        None => vicw_config::load_config(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check => match config.validate() {
            Ok(()) => {
                println!("configuration ok");
                println!("  context.max_tokens = {}", config.context.max_tokens);
                println!("  embedding.dimension = {}", config.embedding.dimension);
                println!("  llm.model = {}", config.llm.model);
                println!("  server = {}:{}", config.server.host, config.server.port);
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
    }
}
