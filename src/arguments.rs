/// Command-line argument handling for the marketgate binary
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "marketgate", about = "Market data gateway service")]
pub struct Arguments {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', default_value = "marketgate.toml")]
    pub config: PathBuf,

    /// Enable verbose logging (shows debug and verbose output for all modules)
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug logging for a specific module (repeatable):
    /// gateway, cache, batch, stream, api, config, system
    #[arg(long = "debug", value_name = "MODULE")]
    pub debug_modules: Vec<String>,
}

impl Arguments {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
