use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use zipbox::config::HumanDuration;

#[derive(Parser, Debug)]
#[command(name = "zipbox")]
#[command(about = "Bundle stored files into ZIP archives on request", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and the periodic retention sweep
    Server(ServerArgs),
    /// Sweep the output directory once and print the statistics
    Sweep(SweepArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (default: $ZIPBOX_CONFIG or config/zipbox.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Retention window, e.g. `7d` or `12h` (overrides `retention.max_age`)
    #[arg(long)]
    pub max_age: Option<HumanDuration>,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}
