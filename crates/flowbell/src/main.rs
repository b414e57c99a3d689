// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FlowBell - relay device notifications to a webhook.
//!
//! This is the binary entry point for the FlowBell relay.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use flowbell_config::FlowbellConfig;

/// FlowBell - relay device notifications to a webhook.
#[derive(Parser, Debug)]
#[command(name = "flowbell", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the delivery workers, retention task, and local HTTP API.
    Serve,
    /// Queue notifications read as JSON from a file or stdin.
    Capture {
        /// JSON file holding one notification or an array of them.
        /// Reads stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Show queue statistics and whether the relay is running.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Move a FAILED entry back to PENDING.
    Retry {
        /// Queue entry id.
        id: i64,
    },
    /// Delete queue entries older than the history window.
    Purge {
        /// Age threshold in days. Defaults to the stored history window.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Enable or disable forwarding for one source app.
    #[command(group(ArgGroup::new("state").required(true).args(["enable", "disable"])))]
    Toggle {
        /// Package name of the source app.
        package: String,
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> FlowbellConfig {
    let loaded = match path {
        Some(path) => flowbell_config::load_and_validate_path(path),
        None => flowbell_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            flowbell_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    serve::init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Capture { file }) => commands::run_capture(&config, file.as_deref()).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Retry { id }) => commands::run_retry(&config, id).await,
        Some(Commands::Purge { days }) => commands::run_purge(&config, days).await,
        Some(Commands::Toggle {
            package,
            enable,
            disable,
        }) => commands::run_toggle(&config, &package, enable && !disable).await,
        None => {
            println!("flowbell: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
