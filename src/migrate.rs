use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the ingredient schema on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingredients (
            id TEXT PRIMARY KEY,
            external_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            calories REAL,
            protein REAL,
            carbs REAL,
            fat REAL,
            fiber REAL,
            sugar REAL,
            sodium REAL,
            calcium REAL,
            iron REAL,
            vitamin_c REAL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            dietary_json TEXT NOT NULL DEFAULT '{}',
            search_text TEXT NOT NULL,
            synced_at INTEGER NOT NULL,
            UNIQUE(external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingredients_category ON ingredients(category)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ingredients_synced_at ON ingredients(synced_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
