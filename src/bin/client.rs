//! # Client Binary Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Replace the local contact file with the server's contacts
//! cargo run --bin client -- --config config/client.toml sync
//!
//! # Print the server's contacts without touching the local file
//! cargo run --bin client -- fetch
//!
//! # Push one contact
//! cargo run --bin client -- add Alice 555-0100 alice@example.com
//!
//! # Send a raw command
//! cargo run --bin client -- raw "SYNC:"
//! ```

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, LevelFilter};
use std::io::Write;

use contact_sync::client::{ClientConfig, SyncClient};
use contact_sync::common::config::load_config;
use contact_sync::contacts::{Contact, ContactBook};

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    ///
    /// Example: config/client.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Override the server as `host:port`
    #[arg(short, long)]
    server: Option<String>,

    /// Log protocol traffic
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Replace the local contact file with the server's contacts
    Sync,
    /// Print the server's contacts
    Fetch,
    /// Add a contact on the server
    Add {
        name: String,
        phone: String,
        email: String,
    },
    /// Send a raw command and print the reply
    Raw { command: String },
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

    let config: ClientConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    let target = args.server.clone().unwrap_or_else(|| config.server_target());
    let client = SyncClient::new(&config.wire)?;

    match args.command {
        Action::Sync => {
            let mut book = ContactBook::load(&config.client.contacts_file)?;
            match client.sync_contacts(&target, &mut book).await {
                Ok(count) => {
                    book.save(&config.client.contacts_file)?;
                    println!("Synchronization completed successfully! {} contact(s)", count);
                }
                Err(e) => {
                    error!("❌ Synchronization failed: {:#}", e);
                    return Err(e);
                }
            }
        }
        Action::Fetch => {
            for contact in client.fetch_contacts(&target).await? {
                println!("{:<20} {:<20} {}", contact.name, contact.phone, contact.email);
            }
        }
        Action::Add { name, phone, email } => {
            let contact = Contact::new(name, phone, email)?;
            let reply = client.add_contact(&target, &contact).await?;
            println!("{}", reply);
        }
        Action::Raw { command } => {
            println!("{}", client.send_command(&target, &command).await?);
        }
    }

    Ok(())
}
