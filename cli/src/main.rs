//! Library service CLI server
//!
//! Headless REST backend suitable for deployment as a systemd service,
//! Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/library-service/config.toml)
//! library-service
//!
//! # Custom config path
//! library-service --config /etc/library-service/config.toml
//!
//! # Override the port
//! library-service --port 8080
//!
//! # Validate config without starting
//! library-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use library_backend::config::{AppConfig, ConfigError};
use library_backend::infrastructure::database::redact_url;
use library_backend::server::{init_tracing, ServerHandle, ServerOptions};

/// Library service: staff accounts, branches, students and reminders.
#[derive(Parser, Debug)]
#[command(
    name = "library-service",
    version,
    about = "REST backend for library branch and membership management",
    long_about = "Library service REST API with session authentication and \
                  role-based permissions.\n\n\
                  Default config: ~/.config/library-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "LIBRARY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Skip creating the default admin user.
    #[arg(long)]
    no_admin: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .unwrap_or_else(library_backend::default_config_path);

    let loaded = AppConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => AppConfig::default(),
    };

    // The log level override has to land before the subscriber is built
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match loaded {
        Ok(_) => info!("Configuration loaded from {}", config_path.display()),
        Err(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            if cli.check || matches!(e, ConfigError::Invalid { .. }) {
                return Err(e.into());
            }
            error!("Using default configuration.");
        }
    }

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.port {
        info!("CLI override: port = {}", port);
        config.server.port = port;
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Address     : {}", config.server.address());
        println!(
            "   Database    : {}",
            redact_url(&config.database.connection_url())
        );
        println!("   Log level   : {}", config.logging.level);
        let reminders = match (&config.reminders.provider_url, config.reminders.enabled) {
            (None, _) => "off (no mail provider)",
            (Some(_), true) => "scheduled",
            (Some(_), false) => "manual runs only",
        };
        println!("   Reminders   : {}", reminders);
        println!(
            "   Photos      : {}",
            if config.images.upload_url.is_some() {
                "enabled"
            } else {
                "off (no image host)"
            }
        );
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        create_default_admin: !cli.no_admin,
        config_path: Some(config_path),
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT, SIGHUP)
    handle.install_signal_handler();
    handle.install_reload_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
