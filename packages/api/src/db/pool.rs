//! Database connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::settings::Database;

/// Open a connection pool for the configured database.
pub async fn connect(settings: &Database) -> Result<PgPool, sqlx::Error> {
    info!(
        "Connecting to postgres at {}:{}/{}",
        settings.host, settings.port, settings.database
    );
    PgPoolOptions::new()
        .max_connections(settings.connections)
        .connect(&settings.url())
        .await
}

/// Run the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
