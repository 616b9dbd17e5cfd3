use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    create_user_checkins_table(pool).await?;
    create_user_checkins_indexes(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn create_user_checkins_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_checkins (
            id INTEGER PRIMARY KEY,
            discord_user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            checkin_date DATE NOT NULL,
            checkin_at DATETIME NOT NULL,
            checkout_at DATETIME,
            work_notes TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_checkins_indexes(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_user_checkins_user_date
         ON user_checkins (discord_user_id, checkin_date)",
    )
    .execute(pool)
    .await?;

    // At most one open check-in per user per day
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_checkins_open
         ON user_checkins (discord_user_id, checkin_date)
         WHERE checkout_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}
