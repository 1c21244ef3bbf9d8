// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyrelay - automatic authentication and secure token delivery.
//!
//! This is the binary entry point for the keyrelay agent.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;
mod shutdown;

/// Keyrelay - automatic authentication and secure token delivery.
#[derive(Parser, Debug)]
#[command(name = "keyrelay", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent: authenticate and deliver tokens until terminated.
    Serve,
    /// Validate the configuration for `serve` readiness, then exit.
    ///
    /// Applies the same checks `serve` does at startup, including the
    /// requirements that only matter when running (a role and at least
    /// one sink).
    Check,
}

/// Load the config with the full serve-readiness validation pass, exiting
/// with every problem listed when it fails.
fn load_or_exit(path: Option<&std::path::Path>) -> keyrelay_config::KeyrelayConfig {
    match keyrelay_config::load_and_validate(path) {
        Ok(config) => config,
        Err(errors) => {
            eprintln!("keyrelay: configuration invalid:");
            for error in &errors {
                eprintln!("  - {error}");
            }
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_or_exit(cli.config.as_deref());
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("keyrelay serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check) => {
            let config = load_or_exit(cli.config.as_deref());
            println!(
                "keyrelay: configuration ready for serve (agent.name={}, sinks={})",
                config.agent.name,
                config.sinks.len()
            );
        }
        None => {
            println!("keyrelay: use --help for available commands");
        }
    }
}
