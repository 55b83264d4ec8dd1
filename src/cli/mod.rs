pub mod ingest;
pub mod report;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rewards-etl",
    about = "Loads rewards-receipt JSON exports into a relational schema and answers analytics questions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load users.json, brands.json and receipts.json into the database.
    Ingest {
        /// Directory holding the export files (default: data, or $REWARDS_DATA_DIR)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Run analytics queries over the populated schema.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show database location and per-table row counts.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Top 5 brands by receipts scanned in the current month.
    TopBrands,
    /// Top 5 brands, current month vs previous month.
    MonthCompare,
    /// Average receipt spend, Accepted vs Rejected.
    SpendByStatus,
    /// Total items purchased, Accepted vs Rejected.
    ItemsByStatus,
    /// Brand with the most spend among users created in the last 180 days.
    TopBrandSpend,
    /// Brand with the most transactions among users created in the last 180 days.
    TopBrandCount,
    /// Run every report.
    All,
}
