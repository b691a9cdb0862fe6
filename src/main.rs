//! rpcgate binary.
//!
//! ```text
//! rpcgate serve  --config gateway.toml   compile and serve until SIGINT/SIGTERM
//! rpcgate routes --config gateway.toml   compile and print the dispatch table
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use rpcgate::config::{load_config, GatewayConfig};
use rpcgate::lifecycle::{shutdown_signal, Shutdown};
use rpcgate::observability::{logging, metrics};
use rpcgate::{GatewayError, Server};

#[derive(Parser)]
#[command(name = "rpcgate")]
#[command(about = "RPC-over-HTTP gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the configuration and serve it
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compile the configuration and print the mounted routes
    Routes {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load(path: Option<&PathBuf>) -> Result<GatewayConfig, GatewayError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(GatewayConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = load(config.as_ref())?;
            logging::init(&config.observability);
            tracing::info!("rpcgate v{} starting", env!("CARGO_PKG_VERSION"));

            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let gateway = Server::new().compile(&config)?;
            let listener = TcpListener::bind(&config.listener.bind_address).await?;

            let shutdown = Shutdown::new();
            let rx = shutdown.subscribe();
            shutdown.trigger_on(shutdown_signal());
            gateway.serve(listener, rx).await?;

            tracing::info!("Shutdown complete");
        }
        Commands::Routes { config } => {
            let config = load(config.as_ref())?;
            let gateway = Server::new().compile(&config)?;
            for route in gateway.routes() {
                println!("{}", route);
            }
        }
    }
    Ok(())
}
