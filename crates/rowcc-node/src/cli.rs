//! CLI argument parsing for rowcc

use clap::{Parser, ValueEnum};
use rowcc_core::Strategy;
use std::path::PathBuf;

/// Demo scenarios
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Both demo batches and both reference logs
    All,
    /// Three transactions on rows 3, 4 and 5
    Batch1,
    /// Two transactions writing row 3
    Batch2,
    /// Verify the cyclic and acyclic reference logs
    Logs,
    /// A seeded random batch
    Random,
}

/// Row-level concurrency control demo
#[derive(Parser, Debug, Clone)]
#[command(name = "rowcc")]
#[command(about = "Run transaction batches under different schedulers and verify serializability")]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (TOML, or JSON with a .json extension)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of rows (overrides the config file)
    #[arg(long)]
    pub rows: Option<usize>,

    /// Strategies to run, comma-separated: serial, ordered, pipeline[:P]
    #[arg(long, value_delimiter = ',')]
    pub strategy: Option<Vec<Strategy>>,

    /// Partition count for pipeline strategies
    #[arg(long)]
    pub partitions: Option<usize>,

    /// Scenario to run
    #[arg(long, value_enum, default_value = "all")]
    pub scenario: Scenario,

    /// Transactions in the random batch
    #[arg(long, default_value = "8")]
    pub random_transactions: u32,

    /// Seed for the random batch
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Print a metrics snapshot as JSON after the runs
    #[arg(long)]
    pub metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
