use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Onboard a data source from a symbol-universe snapshot (JSON).
    Init {
        /// Data source table name, e.g. BALANCE_SHEET.
        #[arg(short, long)]
        source: String,

        /// Path to the universe snapshot.
        #[arg(short, long)]
        universe: PathBuf,
    },

    /// Select the extraction batch for a data source.
    Plan {
        /// Data source table name.
        #[arg(short, long)]
        source: String,

        /// Restrict to one exchange, e.g. NYSE.
        #[arg(short, long)]
        exchange: Option<String>,

        /// Cap the batch size (test runs).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip symbols refreshed within the last N hours.
        #[arg(long)]
        skip_recent_hours: Option<i64>,

        /// Override the source's staleness threshold (days).
        #[arg(long)]
        staleness_days: Option<i64>,
    },

    /// Record extraction outcomes from a results file (JSON).
    Apply {
        /// Data source table name.
        #[arg(short, long)]
        source: String,

        /// Path to the outcomes file.
        #[arg(short, long)]
        results: PathBuf,
    },

    /// Report eligibility and progress counts for a data source.
    Status {
        /// Data source table name.
        #[arg(short, long)]
        source: String,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}
