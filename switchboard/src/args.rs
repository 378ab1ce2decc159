use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Switchboard protocol adapter
#[derive(Debug, Parser)]
#[command(
    name = "switchboard",
    about = "Serve the Anthropic Messages API on top of an OpenAI-compatible backend"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SWITCHBOARD_LISTEN")]
    pub listen: Option<SocketAddr>,
}
