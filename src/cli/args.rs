//! Command line argument parsing for the kwrank CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// kwrank - BM25 keyword search over an inverted index
#[derive(Parser, Debug, Clone)]
#[command(name = "kwrank")]
#[command(about = "BM25 keyword search over an inverted index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct KwrankArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl KwrankArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load a corpus and run a BM25 search against one property
    Search(SearchArgs),

    /// Show index statistics of one property
    Stats(StatsArgs),
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Corpus file, one JSON object per line
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Property to search
    #[arg(short, long)]
    pub property: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Search configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Normalize by the real token counts of the corpus
    #[arg(long)]
    pub length_normalization: bool,

    /// Abort the search after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Retrieve and score terms in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Properties to include in hits (comma-separated, default: all)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
}

/// Arguments for showing statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Corpus file, one JSON object per line
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Property to inspect
    #[arg(short, long)]
    pub property: String,

    /// Number of most frequent terms to list
    #[arg(long, default_value = "10")]
    pub top: usize,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
