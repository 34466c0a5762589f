use crate::core::config::StoreConfig;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Embedded schema migrations. Applied versions are recorded in `_sqlx_migrations`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn create_pool(config: &StoreConfig) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    if let Some(max_page_count) = config.max_page_count {
        options = options.pragma("max_page_count", max_page_count.to_string());
    }

    let pool_options =
        SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

    if config.is_in_memory() {
        // Every connection to `:memory:` is a separate database, so keep exactly one alive
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
    } else {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        pool_options
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
    }
}

/// Apply pending migrations. Migrations only ever add tables and indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
