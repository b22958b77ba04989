//! Command-line interface definitions for stowaway.
//!
//! # Example
//!
//! ```bash
//! # Store a file in the "Profiles" cache folder
//! stowaway put Profiles me.json ./me.json
//!
//! # Print it back
//! stowaway get Profiles me.json
//!
//! # List entries of a persistent (document scope) folder as JSON
//! stowaway --scope document list Settings --json
//!
//! # Use an explicit root, e.g. for a sandbox
//! stowaway --root /tmp/sandbox clear Profiles
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::Scope;

/// Inspect and edit stowaway cache folders.
#[derive(Debug, Parser)]
#[command(name = "stowaway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory overriding the platform directory for the scope
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Storage scope of the cache folder
    #[arg(long, value_enum, default_value = "cache", global = true)]
    pub scope: ScopeArg,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the raw content of an entry to stdout
    Get(EntryArgs),
    /// Store a file (or stdin) as an entry
    Put(PutArgs),
    /// Delete an entry
    Delete(EntryArgs),
    /// List the entries of a folder
    List(ListArgs),
    /// Remove every entry of a folder
    Clear(FolderArgs),
    /// Print the resolved path of a folder or entry
    Path(PathArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// A cache folder.
#[derive(Debug, Args)]
pub struct FolderArgs {
    /// Cache folder name
    #[arg(value_name = "FOLDER")]
    pub folder: String,
}

/// A single entry in a cache folder.
#[derive(Debug, Args)]
pub struct EntryArgs {
    /// Cache folder name
    #[arg(value_name = "FOLDER")]
    pub folder: String,

    /// Entry filename
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for the put subcommand.
#[derive(Debug, Args)]
pub struct PutArgs {
    /// Cache folder name
    #[arg(value_name = "FOLDER")]
    pub folder: String,

    /// Entry filename
    #[arg(value_name = "NAME")]
    pub name: String,

    /// File to store; reads stdin when omitted
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,
}

/// Arguments for the list subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Cache folder name
    #[arg(value_name = "FOLDER")]
    pub folder: String,

    /// Output entry names as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the path subcommand.
#[derive(Debug, Args)]
pub struct PathArgs {
    /// Cache folder name
    #[arg(value_name = "FOLDER")]
    pub folder: String,

    /// Entry filename; prints the folder path when omitted
    #[arg(value_name = "NAME")]
    pub name: Option<String>,
}

/// Storage scope selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScopeArg {
    /// Persistent data directory
    Document,
    /// Regenerable cache directory
    #[default]
    Cache,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Document => Scope::Document,
            ScopeArg::Cache => Scope::Cache,
        }
    }
}
