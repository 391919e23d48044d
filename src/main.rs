//! CLI for CoapSub
//!
//! Loads configuration, applies command line overrides and runs the UDP
//! relay until ctrl-c.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use coapsub::broker::{Dispatcher, Registry};
use coapsub::config::{Settings, load_config};
use coapsub::transport::udp::UdpServer;
use coapsub::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "coapsub", about = "Topic based publish/subscribe relay over CoAP")]
struct Cli {
    /// Config file to load instead of config/default
    #[arg(long)]
    config: Option<String>,

    /// Address to bind the UDP listener to
    #[arg(long)]
    host: Option<String>,

    /// UDP port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = match load_config(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut settings);
    logging::init(&settings.logging.level);

    let dispatcher = Arc::new(Dispatcher::new(Registry::with_capacity(
        settings.broker.capacity,
    )));

    let server = match UdpServer::bind(&settings.bind_addr(), dispatcher, &settings.server).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        _ = server.run() => {
            error!("UDP listener exited unexpectedly.");
            ExitCode::FAILURE
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            ExitCode::SUCCESS
        }
    }
}
