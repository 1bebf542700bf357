//! Reusable library service runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! database init, migrations, startup bootstraps, REST API, periodic
//! tasks, metrics, permission reloads and graceful shutdown.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::{
    start_reminder_task, start_session_sweep_task, PhotoService, ReminderService, UserService,
};
use crate::config::{AppConfig, ConfigError};
use crate::domain::{PermissionRegistry, RepositoryProvider};
use crate::infrastructure::database::bootstrap::{ensure_default_admin, ensure_session_table};
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{
    init_database, DatabaseConfig, HttpImageHost, HttpMailer, SeaOrmRepositoryProvider,
};
use crate::interfaces::http::cookies::SessionCookies;
use crate::interfaces::http::modules::metrics::install_recorder;
use crate::interfaces::http::{create_api_router, ApiContext};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the library service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Create the default admin user if no admin exists (default: true).
    pub create_default_admin: bool,
    /// File re-read for `[permissions.roles]` on SIGHUP.
    pub config_path: Option<PathBuf>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            create_default_admin: true,
            config_path: None,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running library service.
///
/// # Examples
///
/// ```rust,no_run
/// use library_backend::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     // ... wait for shutdown signal ...
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// Role table used by the permission guards.
    pub registry: PermissionRegistry,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Port the API is listening on.
    pub port: u16,

    config_path: Option<PathBuf>,
    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the service with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus metrics recorder
    /// 2. Connect to the database and run migrations
    /// 3. Ensure the session table and the default admin exist
    /// 4. Start the session sweep and reminder tasks
    /// 5. Start the REST API server (with Swagger UI)
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting library service...");

        // The global recorder can only be installed once per process;
        // a restart within the same process reuses it.
        static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
        let prometheus = PROM_HANDLE.get_or_init(install_recorder).clone();
        if prometheus.is_some() {
            info!("📊 Prometheus metrics recorder ready");
        }

        // ── Database ───────────────────────────────────────────
        let db_config = DatabaseConfig::from(&app_cfg.database);
        let db = init_database(&db_config).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            Migrator::up(&db, None).await?;
            info!("Migrations completed");
        }

        // ── Bootstraps ─────────────────────────────────────────
        ensure_session_table(&db).await?;

        if opts.create_default_admin {
            ensure_default_admin(&db, &app_cfg.admin.clone().with_env_overrides()).await?;
        }

        // ── Repositories & Services ────────────────────────────
        let registry = PermissionRegistry::from_config(&app_cfg.permissions.roles);
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let users = Arc::new(UserService::new(
            repos.clone(),
            chrono::Duration::hours(app_cfg.session.ttl_hours),
        ));
        let reminders = match HttpMailer::from_config(&app_cfg.reminders)? {
            Some(mailer) => Some(Arc::new(ReminderService::new(
                repos.clone(),
                Arc::new(mailer),
                app_cfg.reminders.clone(),
            ))),
            None => {
                warn!("No mail provider configured (reminders.provider_url), reminders are off");
                None
            }
        };
        let photos = match HttpImageHost::from_config(&app_cfg.images)? {
            Some(host) => Some(Arc::new(PhotoService::new(
                repos.clone(),
                Arc::new(host),
                app_cfg.images.max_bytes,
            ))),
            None => {
                info!("No image host configured (images.upload_url), photo uploads are off");
                None
            }
        };

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        start_session_sweep_task(
            repos.clone(),
            shutdown_signal.clone(),
            app_cfg.session.sweep_interval_secs,
        );

        match (&reminders, app_cfg.reminders.enabled) {
            (Some(service), true) => start_reminder_task(
                service.clone(),
                shutdown_signal.clone(),
                app_cfg.reminders.interval_secs,
            ),
            (Some(_), false) => info!("Scheduled membership reminders disabled"),
            (None, _) => {}
        }

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(ApiContext {
            db: db.clone(),
            repos: repos.clone(),
            users,
            reminders,
            photos,
            registry: registry.clone(),
            cookies: SessionCookies::from_config(&app_cfg.session),
            report_window_days: app_cfg.reminders.days_before,
            prometheus,
        })?;

        let api_addr = app_cfg.server.address();
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let port = listener.local_addr()?.port();
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        info!("🚀 Library service started.");

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            repos,
            registry,
            config: app_cfg,
            port,
            config_path: opts.config_path,
            db,
            shutdown,
            api_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Reload `[permissions.roles]` from the config file on SIGHUP.
    ///
    /// Requests already past their permission check keep the table they
    /// were decided with. Does nothing without a config path.
    pub fn install_reload_handler(&self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        let registry = self.registry.clone();
        let shutdown = self.shutdown.signal();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(hangup) => hangup,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGHUP handler");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = hangup.recv() => {
                        info!("📡 Received SIGHUP, reloading permissions");
                        if let Err(e) = reload_permissions(&registry, &path) {
                            error!(error = %e, "Permission reload failed, keeping current table");
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
        });

        #[cfg(not(unix))]
        {
            let _ = (path, registry, shutdown);
            info!("Permission reload on SIGHUP is only available on unix");
        }
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    ///
    /// In-flight requests get `shutdown_timeout` seconds to finish.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        let timeout = std::time::Duration::from_secs(self.shutdown.timeout_secs());
        match tokio::time::timeout(timeout, self.api_task).await {
            Ok(Ok(())) => info!("REST API server stopped"),
            Ok(Err(e)) => error!("REST API server task panicked: {}", e),
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "REST API server did not stop in time"
            ),
        }

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Library service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down library service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Re-read the config file and install its role grants as a new table.
///
/// Returns the installed version, `None` if the registry lock is poisoned.
pub fn reload_permissions(
    registry: &PermissionRegistry,
    path: &Path,
) -> Result<Option<u64>, ConfigError> {
    let config = AppConfig::load(path)?;
    let version = registry.reload(&config.permissions.roles);
    if let Some(version) = version {
        info!(
            version,
            roles = config.permissions.roles.len(),
            "Permission table reloaded from {}",
            path.display()
        );
    }
    Ok(version)
}

/// Initialise the global tracing subscriber from the logging config.
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;

    fn test_options() -> ServerOptions {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.server.shutdown_timeout = 5;
        config.database = DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 5,
        };
        config.reminders.enabled = false;
        ServerOptions {
            config,
            ..Default::default()
        }
    }

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("library-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reload_applies_role_grants_from_file() {
        use crate::domain::names::{ROLE_STAFF, SEND_REMINDERS};
        use crate::domain::{CombineMode, PermissionRequirement, PermissionSubject};

        struct Staff;
        impl PermissionSubject for Staff {
            fn role(&self) -> &str {
                ROLE_STAFF
            }
            fn permission_overrides(&self) -> Option<&[String]> {
                None
            }
        }

        let registry = PermissionRegistry::default();
        let requirement =
            PermissionRequirement::new([SEND_REMINDERS], CombineMode::All).unwrap();
        assert!(!registry.decide(&Staff, &requirement).is_allowed());

        let path = temp_config("[permissions.roles]\nstaff = [\"send_reminders\"]\n");
        let version = reload_permissions(&registry, &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(version, Some(2));
        assert!(registry.decide(&Staff, &requirement).is_allowed());
    }

    #[test]
    fn broken_file_keeps_the_current_table() {
        let registry = PermissionRegistry::default();
        let path = temp_config("[permissions.roles\n");
        let result = reload_permissions(&registry, &path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        assert_eq!(registry.snapshot().unwrap().version(), 1);
    }

    #[tokio::test]
    async fn invalid_config_is_refused_before_binding() {
        let mut opts = test_options();
        opts.config.reminders.days_before = i64::MAX;
        assert!(ServerHandle::start(opts).await.is_err());
    }

    #[tokio::test]
    async fn start_bootstraps_and_shuts_down() {
        // DATABASE_URL would override the in-memory url
        if std::env::var("DATABASE_URL").is_ok() {
            return;
        }

        let handle = ServerHandle::start(test_options()).await.unwrap();
        assert!(handle.is_running());
        assert_ne!(handle.port, 0);

        let admins = handle
            .repos
            .users()
            .get_user_by_username(&handle.config.admin.username)
            .await
            .unwrap();
        assert!(admins.is_some());

        handle.shutdown().await;
    }
}
