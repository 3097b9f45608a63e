// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threadline - streams assistant replies from a thread/run AI provider to
//! chat clients.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use threadline_config::{ConfigError, ThreadlineConfig};

/// Threadline - AI response relay.
#[derive(Parser, Debug)]
#[command(name = "threadline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay HTTP server.
    Serve,
    /// Manage businesses.
    Business {
        #[command(subcommand)]
        action: BusinessCommand,
    },
    /// Manage agents.
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BusinessCommand {
    /// Create a business and print it as JSON.
    Create {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum AgentCommand {
    /// Create an agent for a business and print it as JSON.
    Create {
        #[arg(long)]
        business: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        instructions: String,
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        /// Advertised capability (`attachments`, `voice`). Repeatable.
        #[arg(long = "capability")]
        capabilities: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print the effective values.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<ThreadlineConfig, Vec<ConfigError>> {
    match path {
        Some(path) => threadline_config::load_and_validate_path(path),
        None => threadline_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            threadline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            serve::init_tracing(&config.log.level);
            serve::run_serve(config).await
        }
        Some(Commands::Business {
            action: BusinessCommand::Create { name },
        }) => admin::create_business(&config, &name).await,
        Some(Commands::Agent {
            action:
                AgentCommand::Create {
                    business,
                    name,
                    instructions,
                    model,
                    capabilities,
                },
        }) => {
            admin::create_agent(&config, business, &name, &instructions, &model, &capabilities)
                .await
        }
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => {
            println!("threadline: configuration is valid");
            println!("{config:#?}");
            Ok(())
        }
        None => {
            println!("threadline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("threadline: {e}");
        std::process::exit(1);
    }
}
