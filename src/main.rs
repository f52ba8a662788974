// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! snow CLI - project definitions and container services

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use snowcli::commands::{
    self, compute_pool::ComputePoolCommand, helpers::HelpersCommand, service::ServiceCommand,
    CommandContext,
};
use snowcli::output::{OutputFormat, Printer};
use snowcli::{config, logging};

#[derive(Parser)]
#[command(name = "snow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show info level logs
    #[arg(long, global = true)]
    verbose: bool,

    /// Show debug level logs
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "SNOWFLAKE_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Connection name from the configuration file
    #[arg(short, long, global = true, env = "SNOWFLAKE_DEFAULT_CONNECTION_NAME")]
    connection: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project definition helpers
    Helpers {
        #[command(subcommand)]
        command: HelpersCommand,
    },

    /// Snowpark Container Services
    Spcs {
        #[command(subcommand)]
        command: SpcsCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum SpcsCommands {
    /// Manage services
    Service {
        #[command(subcommand)]
        command: ServiceCommand,
    },

    /// Manage compute pools
    ComputePool {
        #[command(subcommand)]
        command: ComputePoolCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load(cli.config_file.as_deref())?;
    logging::init(cli.verbose, cli.debug, &config.cli.logs)?;

    let printer = Printer::new(cli.format, !cli.no_color);

    match cli.command {
        Commands::Helpers { command } => commands::helpers::run(command, &printer),
        Commands::Spcs { command } => {
            let ctx = CommandContext {
                config,
                connection: cli.connection,
                printer,
            };
            match command {
                SpcsCommands::Service { command } => commands::service::run(command, &ctx),
                SpcsCommands::ComputePool { command } => commands::compute_pool::run(command, &ctx),
            }
        }
        Commands::Completions { shell } => commands::completions::run(shell, &mut Cli::command()),
    }
}
