//! Command line interface.
//!
//! `jobs`, `fetch` and `patch-all` drive the pipeline; anything else is handed
//! to the patcher executable verbatim.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fetch APKs and run them through the ReVanced patcher.
#[derive(Debug, Parser)]
#[command(name = "revancedbot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file (defaults to ./revancedbot.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Staging root for the patcher, downloads and patched output.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Only process the first three discovered jobs.
    #[arg(long, global = true, default_value_t = false)]
    pub low_resource: bool,

    /// Print the patch report as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the jobs discovered from the patcher's version listing.
    Jobs,

    /// Download every job's APK and print the downloaded paths.
    Fetch,

    /// Download and patch everything, then print the results.
    PatchAll,

    /// Forwarded to the patcher as `<mode> <patch bundle> <args...>`.
    #[command(external_subcommand)]
    Patcher(Vec<OsString>),
}
