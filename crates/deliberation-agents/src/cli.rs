use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run grievance deliberations between Sentinel, Governor and Arbiter", long_about = None)]
pub struct Args {
    /// TOML file overriding environment defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session directory (overrides DELIBERATION_STORE_DIR)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register a grievance and open a negotiation session
    Open {
        /// Grievance text
        text: String,
        /// Session id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "medium")]
        budget: String,
        #[arg(long, default_value = "normal")]
        urgency: String,
    },
    /// Conduct the next round of a session
    Round { id: String },
    /// Conduct rounds until the Arbiter speaks or the cap is reached
    Run {
        id: String,
        /// Round cap (overrides the configured max_rounds)
        #[arg(long)]
        max_rounds: Option<u32>,
    },
    /// Synthesize and commit a binding consensus under administrator parameters
    Finalize {
        id: String,
        #[arg(long)]
        budget: String,
        #[arg(long)]
        urgency: String,
        /// Implementation window in days
        #[arg(long)]
        days: u32,
    },
    /// Print a session summary
    Show {
        id: String,
        /// Include the full round log
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// List stored session ids
    List,
}
