mod config;
mod connection;
mod ext;
mod forwarding;
mod messages;
mod players;
mod server;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use config::ServerConfig;
use ext::Extensions;
use forwarding::ForwardingMode;
use server::Server;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load("server.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load server.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "Flint v{} starting on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.ip,
        config.server.port
    );
    info!("MOTD: {}", config.status.motd);
    info!("Max players: {}", config.status.max_players);
    info!("Online mode: {}", config.server.online_mode);
    if config.proxy.mode != ForwardingMode::None {
        info!("Proxy forwarding: {:?}", config.proxy.mode);
    }

    let bind: SocketAddr = format!("{}:{}", config.server.ip, config.server.port)
        .parse()
        .expect("invalid bind address");

    // Policy stores (bans, whitelist) live next to the config file.
    let server = match Server::new(config, ".", Extensions::new()) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Failed to initialise the server: {e}");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {bind}: {e}");
            std::process::exit(1);
        }
    };
    info!("Listening on {bind}");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        tokio::spawn(connection::handle(stream, addr, server.clone()));
                    }
                    Err(e) => error!("Failed to accept a connection: {e}"),
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    // Returning tears down the runtime, which closes every live connection.
    info!("Server shut down.");
}
