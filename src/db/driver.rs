//! Database drivers.
#[cfg(feature = "pg")]
pub mod pg;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use super::migrations::Migrator;
use crate::error::BannerError;
use crate::error::Result;

/// Trait for database [drivers](super::driver#modules) backing the banner store.
#[async_trait]
pub trait DatabaseDriver: Debug + Sync + Send + 'static {
    /// Return driver name.
    fn name(&self) -> &'static str;
    /// Returns the database connection for the driver.
    fn connection(&self) -> DatabaseConnection;
    /// Configure the database connection parameters. See corresponding driver implementation for details.
    async fn configure(&self) -> Result<()>;

    /// Configure the connection and bring the schema up to date.
    async fn prepare(&self) -> Result<()> {
        self.configure().await?;
        Migrator::up(&self.connection(), None)
            .await
            .map_err(BannerError::db("schema migration", None))
    }
}
