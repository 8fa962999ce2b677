//! Connection smoke test: connect, NOOP, close.

use anyhow::Result;
use clap::Parser;
use smtp_client::proto::{Command, Outbound};
use smtp_client::{ConnectConfig, Connection};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// SMTP connection smoke test
#[derive(Parser, Debug)]
#[command(name = "smtp-smoke")]
#[command(about = "Connect to an SMTP server, issue NOOP, close")]
#[command(version = smtp_client::VERSION)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load or create config
    let mut config = match &args.config {
        Some(path) => ConnectConfig::from_file(path)?,
        None => {
            let mut config = ConnectConfig::default();
            config.server.port = 2525;
            config
        }
    };

    // Apply command line overrides
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("smtp-smoke {}", smtp_client::VERSION);
    info!("Server: {}:{}", config.server.host, config.server.port);

    let connection = Connection::connect(config).await?;
    info!("connected");

    let reply = connection.write(Outbound::Command(Command::Noop)).await?;
    info!(code = %reply.code, "NOOP acknowledged");

    connection.close().await?;
    info!("connection closed");

    Ok(())
}
