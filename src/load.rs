//! Idempotent batch loading into the ingredient store.
//!
//! The sink contract: upsert a batch keyed on the provider's stable
//! external id and report how many rows were actually written. Partial
//! failure is a count, not an exception — a failed row is logged and the
//! batch keeps going, because the upsert is idempotent and a later run
//! retries it naturally.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::NormalizedIngredient;

#[async_trait]
pub trait IngredientSink: Send + Sync {
    /// Upsert a batch, returning the number of rows actually written.
    /// Rows the sink resolves as already-present duplicates are not
    /// counted and not errors.
    async fn upsert_batch(&self, batch: &[NormalizedIngredient]) -> Result<usize>;
}

pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-update one ingredient. Returns whether a row was
    /// written (`false` when a legacy row was found and left as-is).
    async fn upsert_one(&self, ingredient: &NormalizedIngredient) -> Result<bool> {
        let id = Uuid::new_v4().to_string();
        let tags_json = serde_json::to_string(&ingredient.tags)?;
        let dietary_json = serde_json::to_string(&ingredient.dietary)?;

        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (
                id, external_id, name, category,
                calories, protein, carbs, fat, fiber, sugar,
                sodium, calcium, iron, vitamin_c,
                tags_json, dietary_json, search_text, synced_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                calories = excluded.calories,
                protein = excluded.protein,
                carbs = excluded.carbs,
                fat = excluded.fat,
                fiber = excluded.fiber,
                sugar = excluded.sugar,
                sodium = excluded.sodium,
                calcium = excluded.calcium,
                iron = excluded.iron,
                vitamin_c = excluded.vitamin_c,
                tags_json = excluded.tags_json,
                dietary_json = excluded.dietary_json,
                search_text = excluded.search_text,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&id)
        .bind(ingredient.external_id)
        .bind(&ingredient.name)
        .bind(&ingredient.category)
        .bind(ingredient.nutrients.calories)
        .bind(ingredient.nutrients.protein)
        .bind(ingredient.nutrients.carbs)
        .bind(ingredient.nutrients.fat)
        .bind(ingredient.nutrients.fiber)
        .bind(ingredient.nutrients.sugar)
        .bind(ingredient.nutrients.sodium)
        .bind(ingredient.nutrients.calcium)
        .bind(ingredient.nutrients.iron)
        .bind(ingredient.nutrients.vitamin_c)
        .bind(&tags_json)
        .bind(&dietary_json)
        .bind(&ingredient.search_text)
        .bind(ingredient.synced_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db_err)) => {
                // A constraint the upsert target cannot resolve — e.g. a
                // legacy row keyed by name rather than external id. An
                // existing match is a duplicate no-op, not a failure.
                let existing: Option<String> =
                    sqlx::query_scalar("SELECT id FROM ingredients WHERE external_id = ? OR name = ?")
                        .bind(ingredient.external_id)
                        .bind(&ingredient.name)
                        .fetch_optional(&self.pool)
                        .await?;
                if existing.is_some() {
                    Ok(false)
                } else {
                    Err(sqlx::Error::Database(db_err).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IngredientSink for SqliteSink {
    async fn upsert_batch(&self, batch: &[NormalizedIngredient]) -> Result<usize> {
        let mut written = 0usize;

        for ingredient in batch {
            match self.upsert_one(ingredient).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    eprintln!(
                        "Warning: failed to upsert ingredient {}: {}",
                        ingredient.external_id, e
                    );
                }
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::{DietaryFlags, Nutrients};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_sink(dir: &std::path::Path) -> SqliteSink {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}/test.sqlite", dir.display()))
                .unwrap()
                .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteSink::new(pool)
    }

    fn ingredient(external_id: i64, name: &str) -> NormalizedIngredient {
        NormalizedIngredient {
            external_id,
            name: name.to_string(),
            category: "vegetables".to_string(),
            nutrients: Nutrients {
                calories: Some(23.0),
                ..Nutrients::default()
            },
            tags: vec!["vegetables".to_string()],
            dietary: DietaryFlags::default(),
            search_text: name.to_lowercase(),
            synced_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_external_id() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = test_sink(tmp.path()).await;

        let batch = vec![ingredient(1, "Spinach"), ingredient(2, "Kale")];

        let first = sink.upsert_batch(&batch).await.unwrap();
        assert_eq!(first, 2);

        let second = sink.upsert_batch(&batch).await.unwrap();
        assert_eq!(second, 2);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn reingest_updates_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = test_sink(tmp.path()).await;

        sink.upsert_batch(&[ingredient(7, "Carrot")]).await.unwrap();
        sink.upsert_batch(&[ingredient(7, "Carrot, raw")])
            .await
            .unwrap();

        let name: String =
            sqlx::query_scalar("SELECT name FROM ingredients WHERE external_id = 7")
                .fetch_one(&sink.pool)
                .await
                .unwrap();
        assert_eq!(name, "Carrot, raw");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
