//! # Server Binary Entry Point
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server -- --config config/server.toml
//! cargo run --bin server -- --port 9000
//! ```
//!
//! The server will:
//! 1. Load configuration from the specified TOML file (or use defaults)
//! 2. Load seed contacts from the configured contacts file, if any
//! 3. Accept clients until Ctrl-C
//! 4. Close every connection and, in shared mode, optionally save the store

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

use contact_sync::common::config::load_config;
use contact_sync::contacts::ContactBook;
use contact_sync::server::{ContactServer, ServerConfig, StoreMode};

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server configuration file (TOML format)
    ///
    /// Example: config/server.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured listening port
    #[arg(short, long)]
    port: Option<i64>,

    /// Log protocol traffic
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger(verbose: bool) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut config: ServerConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let seed = match &config.store.contacts_file {
        Some(path) => ContactBook::load(path)?,
        None => ContactBook::new(),
    };
    info!("📇 Loaded {} seed contact(s)", seed.len());

    let mut server = ContactServer::from_config(&config, seed)?;
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("⏹️  Interrupt received");

    let shared = server.stop().await;

    if let (StoreMode::Shared, true, Some(path), Some(book)) = (
        config.store.mode,
        config.store.save_on_shutdown,
        &config.store.contacts_file,
        shared,
    ) {
        book.save(path)?;
    }

    Ok(())
}
