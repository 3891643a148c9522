// src/main.rs

//! The main entry point for the quillmaster server application.

use anyhow::Result;
use quillmaster::config::Config;
use quillmaster::core::protocol::HostPort;
use quillmaster::server;
use std::env;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("QUILLMASTER_BUILD_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("quillmaster version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via --config; otherwise it defaults
    // to "quillmaster.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("quillmaster.toml");

    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    // Override the port of every RPC bind address.
    if let Some(port_index) = args.iter().position(|arg| arg == "--rpc-port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) => {
                    config.rpc_bind_addresses = config
                        .rpc_bind_addresses
                        .iter()
                        .map(|addr| HostPort::new(addr.host.clone(), port))
                        .collect();
                }
                Err(_) => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--rpc-port flag requires a value");
            std::process::exit(1);
        }
    }

    // RUST_LOG takes precedence over the configured level.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    if let Err(e) = server::run(config).await {
        error!("Master runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
