//! CLI command definitions for the `linkhub` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the Telegram
//! bot; the other commands inspect or maintain the project registry.

pub mod project;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Build and publish Telegram link hub pages.
#[derive(Parser)]
#[command(name = "linkhub", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Telegram bot (long polling) until interrupted.
    Serve,

    /// List registered hub pages.
    #[command(alias = "ls")]
    List,

    /// Show one hub page by edit key.
    Show {
        /// Edit key of the page.
        key: String,
    },

    /// Re-render every registered page with the current templates and
    /// redeploy it under its existing project.
    Redeploy,

    /// Import pages from a legacy `projects.json` registry file.
    Import {
        /// Path to the legacy registry file.
        path: PathBuf,
    },
}
