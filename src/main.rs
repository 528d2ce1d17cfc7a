// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Portyard CLI - source-level dependency manager for git-backed ports

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use owo_colors::OwoColorize;
use portyard::{commands, error};

#[derive(Parser)]
#[command(name = "portyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, fetch, prepare and link all dependencies
    Install,

    /// Pull every present port checkout
    Update,

    /// Run a named project script (or list scripts)
    Run {
        /// Script name
        name: Option<String>,

        /// Positional arguments passed to the script
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Publish or consume local, un-committed ports
    Sync {
        /// Target: this, with
        target: String,

        /// Port name or 'all' (for 'with')
        name: Option<String>,
    },

    /// Remove local-port publications or links
    Unsync {
        /// Target: this, with
        target: String,

        /// Port name or 'all' (for 'with')
        name: Option<String>,
    },

    /// Snapshot or compare resolved port refs
    Lock {
        /// Action: save, diff, show
        #[arg(default_value = "show")]
        action: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => tracing::Level::ERROR,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if let Err(err) = execute(cli) {
        match err.downcast_ref::<error::UserError>() {
            Some(user) => {
                eprintln!("{}[{}]: {}", "error".red(), user.code(), user);
            }
            None => {
                eprintln!("{}: {:?}", "error".red(), err);
            }
        }
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    let project = cli.project;
    match cli.command {
        Commands::Install => commands::install::run(project),
        Commands::Update => commands::update::run(project),
        Commands::Run { name, args } => commands::run::run(name, args, project),
        Commands::Sync { target, name } => commands::sync::run_sync(&target, name, project),
        Commands::Unsync { target, name } => commands::sync::run_unsync(&target, name, project),
        Commands::Lock { action } => commands::lock::run(&action, project),
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
