mod cli;
mod db;
mod error;
mod ingest;
mod normalize;
mod parser;
mod reports;
mod schema;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ingest { data_dir } => cli::ingest::run(data_dir),
        Commands::Report { command } => match command {
            ReportCommands::TopBrands => cli::report::top_brands(),
            ReportCommands::MonthCompare => cli::report::month_compare(),
            ReportCommands::SpendByStatus => cli::report::spend_by_status(),
            ReportCommands::ItemsByStatus => cli::report::items_by_status(),
            ReportCommands::TopBrandSpend => cli::report::top_brand_spend(),
            ReportCommands::TopBrandCount => cli::report::top_brand_count(),
            ReportCommands::All => cli::report::all(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
