//! Roundhouse: round-robin HTTP load balancer.

use std::{sync::Arc, time::Duration};

use clap::Parser;
use log::{error, info};

use roundhouse_config::{config::Config, validator::validate as validate_config};
use roundhouse_edge::HttpListener;
use roundhouse_lb::{Backend, ConfigError, Dispatcher};
use roundhouse_transport::{http_client::HttpClient, proxy_backend::ProxyBackend};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    // Sets a custom config file
    #[arg(short, long)]
    config: Option<String>,

    // Overrides listen.port from the config file
    #[arg(short, long)]
    port: Option<u32>,
}

fn build_dispatcher(config: &Config, client: &HttpClient) -> Result<Dispatcher, ConfigError> {
    let timeout = Duration::from_millis(config.upstream.timeout_ms);

    let backends = config
        .backend_addresses()
        .iter()
        .map(|address| -> Result<Arc<dyn Backend>, ConfigError> {
            let backend = ProxyBackend::new(address, client.clone(), timeout)?
                .with_max_body_bytes(config.upstream.max_body_bytes);
            Ok(Arc::new(backend))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Dispatcher::from_backends(backends)
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| "./config/config.yaml".to_string());

    // Read configuration file
    let mut config = match roundhouse_config::loader::read_config(&config_path) {
        Ok(cfg) => cfg,
        Err(err_msg) => {
            eprintln!("Error loading config: {}", err_msg);
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.listen.port = port;
    }

    // Initialize the Logger
    if let Err(err) = roundhouse_utils::logger::init_logger(
        &config.log.level,
        config.log.enabled,
        &config.log.file,
    ) {
        eprintln!("Error initializing logger: {}", err);
        std::process::exit(1);
    }

    // Validate Configurations
    if !validate_config(&config) {
        error!("Configuration validation failed. Exiting...");
        std::process::exit(1);
    }

    let client = match HttpClient::new(config.upstream.max_idle_per_host) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to set up upstream TLS: {}", err);
            std::process::exit(1);
        }
    };

    let dispatcher = match build_dispatcher(&config, &client) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(err) => {
            error!("Invalid backend configuration: {}", err);
            std::process::exit(1);
        }
    };
    info!(
        "Roundhouse is starting with {} backends: {:?}",
        dispatcher.len(),
        dispatcher.pool().addresses()
    );

    let listener = match HttpListener::bind(&config.listen_address(), dispatcher).await {
        Ok(listener) => listener
            .with_max_body_bytes(config.listen.max_body_bytes)
            .with_drain_timeout(Duration::from_millis(config.listen.drain_timeout_ms)),
        Err(err) => {
            error!("Failed to bind {}: {}", config.listen_address(), err);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    if let Err(err) = listener.serve_until(shutdown).await {
        error!("Listener failed: {}", err);
        std::process::exit(1);
    }
}
