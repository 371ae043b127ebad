//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Find duplicate photos and videos in a library and keep two libraries in sync
#[derive(Parser, Debug)]
#[command(name = "media-library")]
#[command(version)]
#[command(about = "Duplicate detection and cross-library sync ids for photo and video libraries", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a library and report its duplicate groups
    ///
    /// Signatures are only computed where capture date and size cannot tell
    /// files apart. The metadata store in the library root is updated.
    Scan {
        /// Library root directory
        dir: PathBuf,

        /// Compute a signature for every file, not just ambiguous ones
        #[arg(long)]
        full: bool,
    },

    /// Compare library A against library B
    Compare {
        /// Library A root directory
        a: PathBuf,

        /// Library B root directory
        b: PathBuf,

        /// Match on storage identity only (no size or signature fallback)
        #[arg(long)]
        exact: bool,
    },

    /// Assign sync ids to the records of two libraries
    SyncIds {
        /// Library A root directory
        a: PathBuf,

        /// Library B root directory
        b: PathBuf,

        /// Sync id cache file (overrides config)
        #[arg(long, value_name = "FILE")]
        cache: Option<PathBuf>,

        /// Write the maps as JSON to this file instead of printing them
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show or reset the configuration file
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\media_library\config.toml
    /// - Linux/macOS: ~/.config/media_library/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path only
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}
