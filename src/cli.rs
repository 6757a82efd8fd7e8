//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TripPlan - travel plan aggregation service
#[derive(Parser, Debug)]
#[command(name = "tripplan", about = "Travel plan aggregation service", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on, overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a single plan and print the artifact locations
    Plan {
        /// City used for the weather forecast
        #[arg(long)]
        city: String,

        #[arg(long)]
        origin: String,

        #[arg(long)]
        destination: String,

        /// Keyword for the ticket search, defaults to the destination
        #[arg(long)]
        ticket_keyword: Option<String>,

        /// Thread id to record the plan under
        #[arg(long)]
        thread_id: Option<String>,
    },
}
