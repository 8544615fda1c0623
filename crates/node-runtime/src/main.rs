//! # Product Distribution Node
//!
//! ```text
//! pdl-node receive [--config PATH]
//! pdl-node send --host H --port P --file PRODUCT [--encoding xml|json] [--legacy]
//! ```
//!
//! ## Startup Sequence (receive)
//!
//! 1. Initialize tracing from `PDL_*` environment variables
//! 2. Load configuration (`--config` or `PDL_CONFIG`, else defaults)
//! 3. Open storage, load the keychain, build the receiver
//! 4. Accept connections until Ctrl+C

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdl_01_product_io::ProductEncoding;
use pdl_02_socket_transport::{SendOutcome, SenderConfig, DEFAULT_PORT};
use pdl_telemetry::{init_tracing, TelemetryConfig};
use tracing::{info, warn};

use node_runtime::{send_file, NodeConfig, NodeContainer};

/// Product distribution node
#[derive(Parser, Debug)]
#[command(name = "pdl-node", version)]
#[command(about = "Receive and send products over the PDL socket protocol")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the receiver until Ctrl+C
    Receive {
        /// TOML configuration file
        #[arg(short, long, env = "PDL_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Send one product file (XML or JSON)
    Send {
        /// Receiver host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Receiver port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Product file to send
        #[arg(short, long)]
        file: PathBuf,

        /// Encoding used on the wire
        #[arg(long, default_value = "xml")]
        encoding: ProductEncoding,

        /// Skip the marker and handshake
        #[arg(long)]
        legacy: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let telemetry = TelemetryConfig::from_env();
    init_tracing(&telemetry).context("Failed to initialize tracing")?;

    match cli.command {
        Command::Receive { config } => receive(config).await,
        Command::Send {
            host,
            port,
            file,
            encoding,
            legacy,
        } => {
            let config = SenderConfig {
                encoding,
                versioned: !legacy,
                ..SenderConfig::new(host, port)
            };
            let outcome = send_file(config, &file)
                .await
                .with_context(|| format!("Failed to send {}", file.display()))?;
            match outcome {
                SendOutcome::AlreadyHave => info!("Receiver already has the product"),
                SendOutcome::Sent { status } => info!(%status, "Product sent"),
            }
            Ok(())
        }
    }
}

async fn receive(config_path: Option<PathBuf>) -> Result<()> {
    let config = match &config_path {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    let container = NodeContainer::build(config)
        .await
        .context("Failed to initialize node")?;
    let listener = container.bind().await.context("Failed to bind receiver")?;

    info!("Node is running. Press Ctrl+C to stop.");
    container
        .serve(listener, async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "Unable to listen for Ctrl+C; running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Node stopped");
    Ok(())
}
