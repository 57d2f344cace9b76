//! steep - a tmux plugin manager
//!
//! Plugins are git clones under one root directory with a JSON registry
//! tracking what is installed at which version. Definitions (TOML or
//! YAML, one per plugin) declare what should be installed; `steep
//! install` makes reality match them.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use steep_core::workers::DEFAULT_PARALLELISM;
use steep_core::{Config, Engine};

mod commands;

/// steep - tmux plugins without the ceremony
#[derive(Parser)]
#[command(name = "steep")]
#[command(about = "Install, update, and manage tmux plugins", long_about = None)]
#[command(version)]
struct Cli {
    /// Root directory (default: ~/.steep, or $STEEP_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install plugins from definition files, or a single named plugin
    Install {
        /// Plugin to install (default: everything defined)
        name: Option<String>,
        /// Delete and re-clone an existing working directory
        #[arg(long)]
        force: bool,
        /// Concurrent installs when installing everything
        #[arg(long, default_value_t = DEFAULT_PARALLELISM, value_name = "N")]
        jobs: usize,
    },
    /// Check every installed plugin for available updates
    Check {
        /// Concurrent remote checks
        #[arg(long, default_value_t = DEFAULT_PARALLELISM, value_name = "N")]
        jobs: usize,
    },
    /// Upgrade one plugin, or everything with an update available
    Upgrade {
        /// Plugin to upgrade
        name: Option<String>,
        /// Upgrade everything not flagged skip_auto_update
        #[arg(long, conflicts_with = "name")]
        all: bool,
        /// Concurrent upgrades
        #[arg(long, default_value_t = DEFAULT_PARALLELISM, value_name = "N")]
        jobs: usize,
    },
    /// Remove a plugin and its registry record
    Remove {
        /// Plugin to remove
        name: String,
    },
    /// Enable a plugin and re-source enabled plugin scripts
    Enable {
        /// Plugin to enable
        name: String,
    },
    /// Disable a plugin without removing it
    Disable {
        /// Plugin to disable
        name: String,
    },
    /// List installed plugins with version, size, and install date
    List,
    /// Run every enabled plugin's scripts (for tmux.conf hooks)
    Source,
    /// Generate definition files from tmux.conf @plugin lines
    Migrate {
        /// Write the definition files instead of just printing the plan
        #[arg(long)]
        apply: bool,
        /// Replace definition files that already exist
        #[arg(long, requires = "apply")]
        overwrite: bool,
    },
}

fn init_logging(config: &Config) {
    let log_dir = config.logs_dir();
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory: {err}");
        return;
    }
    let log_file = match std::fs::File::create(log_dir.join("steep.log")) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to create log file: {err}, logging disabled");
            return;
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("STEEP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("steep=info,steep_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

fn resolve_root(cli_root: Option<PathBuf>) -> PathBuf {
    cli_root
        .or_else(|| std::env::var_os("STEEP_ROOT").map(PathBuf::from))
        .unwrap_or_else(Config::default_root)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new(resolve_root(cli.root));
    init_logging(&config);
    tracing::debug!(root = %config.root().display(), "Resolved root");

    let engine = Engine::with_defaults(config);
    match cli.command {
        Commands::Install { name, force, jobs } => {
            commands::install(&engine, name.as_deref(), force, jobs)
        }
        Commands::Check { jobs } => commands::check(&engine, jobs),
        Commands::Upgrade { name, all, jobs } => commands::upgrade(&engine, name.as_deref(), all, jobs),
        Commands::Remove { name } => commands::remove(&engine, &name),
        Commands::Enable { name } => commands::set_enabled(&engine, &name, true),
        Commands::Disable { name } => commands::set_enabled(&engine, &name, false),
        Commands::List => commands::list(&engine),
        Commands::Source => commands::source(&engine),
        Commands::Migrate { apply, overwrite } => commands::migrate(&engine, apply, overwrite),
    }
}
