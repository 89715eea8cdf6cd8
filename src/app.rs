use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::error;
use tracing::info;

use crate::cache::BannerCache;
use crate::config::Config;
use crate::db::driver::DatabaseDriver;
use crate::db::DbStore;
use crate::error::BannerError;
use crate::error::Result;
use crate::service::BannerService;

/// Process wiring: picks the database driver, brings the schema up to date and assembles the service around it.
/// Transport adapters are expected to take the [`BannerService`] from [`build_service`](Self::build_service).
#[derive(Debug)]
pub struct BannerApp {
    config: Config,
}

impl BannerApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(feature = "tracing")]
    pub fn setup_tracing(&self) -> Result<()> {
        use std::io;
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let dest_writer = Mutex::new(if let Some(log_file) = self.config.log_file() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(|err| BannerError::Internal(format!("cannot open {}: {err}", log_file.display())))?;
            Box::new(file) as Box<dyn io::Write + Send>
        }
        else {
            Box::new(io::stdout()) as Box<dyn io::Write + Send>
        });

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().with_writer(dest_writer))
            .try_init()
            .map_err(|err| BannerError::Internal(err.to_string()))?;

        info!("Tracing initialized");

        Ok(())
    }

    async fn connect_driver(&self) -> Result<Arc<dyn DatabaseDriver>> {
        if self.config.pg() {
            self.connect_pg().await
        }
        else {
            self.connect_sqlite().await
        }
    }

    #[cfg(feature = "pg")]
    async fn connect_pg(&self) -> Result<Arc<dyn DatabaseDriver>> {
        let pg = crate::db::driver::pg::Pg::connect(&self.config.pg_url(), self.config.store_timeout()).await?;
        Ok(Arc::new(pg))
    }

    #[cfg(not(feature = "pg"))]
    async fn connect_pg(&self) -> Result<Arc<dyn DatabaseDriver>> {
        Err(BannerError::Internal("built without PostgreSQL support".into()))
    }

    #[cfg(feature = "sqlite")]
    async fn connect_sqlite(&self) -> Result<Arc<dyn DatabaseDriver>> {
        let sqlite = crate::db::driver::sqlite::Sqlite::connect(&self.config.sqlite_path()).await?;
        Ok(Arc::new(sqlite))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn connect_sqlite(&self) -> Result<Arc<dyn DatabaseDriver>> {
        Err(BannerError::Internal("built without SQLite support".into()))
    }

    /// Connect to the configured database, migrate it and put the cache in front of it. The cache evictor is not
    /// started.
    pub async fn build_service(&self) -> Result<BannerService<DbStore>> {
        let driver = self.connect_driver().await?;
        driver.prepare().await?;
        info!("Using {} database", driver.name());

        let store = Arc::new(DbStore::new(driver.connection(), self.config.store_timeout()));
        let cache = BannerCache::builder()
            .ttl(self.config.cache_ttl())
            .eviction_interval(self.config.eviction_interval())
            .max_capacity(self.config.cache_capacity())
            .build()
            .map_err(|err| BannerError::Internal(err.to_string()))?;

        Ok(BannerService::new(store, cache))
    }

    /// Build the service, keep the cache evictor running until `shutdown_signal` resolves, then shut it down.
    pub async fn run_until<F>(&self, shutdown_signal: F) -> Result<BannerService<DbStore>>
    where
        F: Future<Output = ()>,
    {
        let service = self.build_service().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        service.cache().start_evictor(shutdown_rx);
        info!("Banner service is ready");

        shutdown_signal.await;

        info!("Shutting down");
        // The evictor may already be gone, nobody is left to receive then.
        let _ = shutdown_tx.send(true);
        service.cache().close().await;

        Ok(service)
    }

    /// Run until interrupted with Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for the interrupt signal: {err}");
            }
        })
        .await?;
        Ok(())
    }
}
