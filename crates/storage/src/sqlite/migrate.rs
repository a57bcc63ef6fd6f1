use sqlx::SqlitePool;

use super::SqliteInitError;

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            )
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}
