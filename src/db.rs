use rocket_db_pools::sqlx::{self, PgPool, migrate::Migrator};
use rocket_db_pools::Database;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Primary Postgres pool, configured under `databases.inbox_db`.
#[derive(Database)]
#[database("inbox_db")]
pub struct InboxDb(sqlx::PgPool);

/// Apply pending migrations.
///
/// Idempotent: `run` creates the bookkeeping table if needed, verifies the
/// checksums of applied migrations and applies the rest before we serve
/// traffic.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("checking database migration state");
    MIGRATOR.run(pool).await?;
    log::info!("database migrations up to date");
    Ok(())
}
