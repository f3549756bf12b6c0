// src/main.rs

//! The main entry point for the relaychat server.

use anyhow::Result;
use relaychat::config::{Config, SHARED_DIR_ENV};
use relaychat::server;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("relaychat version {VERSION}");
        return Ok(());
    }

    // An explicit --config must load; the default path is optional.
    let explicit_config = flag_value(&args, "--config");
    let config_path = explicit_config.unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = if explicit_config.is_some() || Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Port from --port, or a bare positional argument as in `relaychat 9000`.
    let port_arg = if args.iter().any(|arg| arg == "--port") {
        match flag_value(&args, "--port") {
            Some(value) => Some(value),
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    } else {
        positional_arg(&args)
    };
    if let Some(port_str) = port_arg {
        match port_str.parse::<u16>() {
            Ok(port) if port != 0 => config.port = port,
            _ => {
                eprintln!("Invalid port number: {port_str}");
                std::process::exit(1);
            }
        }
    }

    config.apply_shared_dir_override(env::var(SHARED_DIR_ENV).ok());

    // Get initial log level from env var or config.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true),
        )
        .init();

    info!("Starting relaychat {}", VERSION);
    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// The first argument that is neither a flag nor a flag's value.
fn positional_arg(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "--port" {
            iter.next();
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg.as_str());
        }
    }
    None
}
