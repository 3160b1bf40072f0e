mod cli;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::info;
use zipbox::config::Config;
use zipbox::retention::RetentionPolicy;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();
    zipbox::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = load_config(args.config.as_deref())?;
            zipbox::api::run(config, args.address).await?;
        }
        Commands::Sweep(args) => {
            let config = load_config(args.config.as_deref())?;
            let mut policy = RetentionPolicy::from_config(&config);
            if let Some(max_age) = args.max_age {
                policy.max_age = max_age.as_duration();
            }
            info!(root = %policy.root.display(), "Running one-off sweep");

            let stats = tokio::task::spawn_blocking(move || policy.sweep()).await??;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Config(args) => {
            let config = load_config(args.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, AnyError> {
    let config = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
