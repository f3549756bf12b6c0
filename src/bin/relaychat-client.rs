// src/bin/relaychat-client.rs

//! The interactive relaychat client.

use anyhow::Result;
use relaychat::client::{self, ClientOptions};
use std::env;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const USAGE: &str = "Usage: relaychat-client <username> <host> <port> [--downloads <dir>]";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("relaychat-client version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let options = match parse_args(&args) {
        Some(options) => options,
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    // Quiet by default so log lines do not mix with chat output.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = client::run(options).await {
        error!("Client error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Option<ClientOptions> {
    let mut positional = Vec::new();
    let mut downloads = PathBuf::from(".");
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--downloads" {
            downloads = PathBuf::from(iter.next()?);
        } else {
            positional.push(arg.as_str());
        }
    }

    let [username, host, port] = positional.as_slice() else {
        return None;
    };
    let port = match port.parse::<u16>() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("Invalid port number: {port}");
            return None;
        }
    };
    Some(ClientOptions {
        username: username.to_string(),
        host: host.to_string(),
        port,
        downloads,
    })
}
