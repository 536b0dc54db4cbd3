//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Grouped failures: inspect, split and selectively catch exception trees
#[derive(Parser, Debug)]
#[command(name = "exceptiongroup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output on stderr (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global config
    #[arg(short, long, global = true, env = "EXCEPTIONGROUP_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the kind hierarchy
    Kinds {
        /// Kind to start from
        #[arg(default_value = "BaseException")]
        root: String,
    },

    /// Show the failure a scenario raises
    Show {
        /// Scenario file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Split the raised group by kinds
    Split {
        /// Scenario file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Kinds to match, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        types: Vec<String>,
    },

    /// Raise the scenario inside a catch scope built from its handlers
    Catch {
        /// Scenario file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Show the global config file location
    Path,
}
