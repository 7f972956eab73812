use clap::Parser;
use tracing::{error, info};

use hybrid_storage::cli::Cli;
use hybrid_storage::{open_backend, Config, WebServer};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };
    cli.apply(&mut config);

    // Initialize logging
    if let Err(e) = hybrid_storage::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        hybrid_storage::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("hybrid-storage starting");
    info!(
        backend = %config.storage.backend,
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let backend = match open_backend(&config.storage).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to open storage backend: {e}");
            std::process::exit(1);
        }
    };

    let server = match WebServer::new(&config, backend) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create web server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Web server error: {e}");
        std::process::exit(1);
    }
}
