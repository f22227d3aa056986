use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "utmka",
    version,
    about = "Generate, store and browse UTM-tagged marketing links"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Base URL of the backend, overriding the configuration
    #[clap(long)]
    pub api_url: Option<String>,

    /// User identity, overriding the configuration
    #[clap(long)]
    pub user_email: Option<String>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the utmka application
    #[clap(subcommand)]
    pub command: Commands,
}
