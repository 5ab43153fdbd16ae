// src/main.rs

//! The main entry point for the storage-plane node process.

use anyhow::Result;
use ringdb::config::Config;
use ringdb::server;
use std::env;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("ringdb version {VERSION}");
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.toml");

    let config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("server runtime error: {e}");
        return Err(e);
    }

    Ok(())
}
