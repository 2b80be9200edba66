//! Ingredient retrieval by external id.
//!
//! Fetches one stored ingredient from the database and prints it. Purely
//! local — the provider is never contacted (see `probe` for that).

use anyhow::{bail, Result};
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_get(config: &Config, external_id: i64) -> Result<()> {
    let pool = db::connect(config).await?;

    let row = sqlx::query(
        r#"
        SELECT id, external_id, name, category,
               calories, protein, carbs, fat, fiber, sugar,
               sodium, calcium, iron, vitamin_c,
               tags_json, dietary_json, synced_at
        FROM ingredients WHERE external_id = ?
        "#,
    )
    .bind(external_id)
    .fetch_optional(&pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => {
            pool.close().await;
            bail!("ingredient not found: {}", external_id);
        }
    };

    let tags: serde_json::Value =
        serde_json::from_str(&row.get::<String, _>("tags_json")).unwrap_or(serde_json::json!([]));
    let dietary: serde_json::Value =
        serde_json::from_str(&row.get::<String, _>("dietary_json"))
            .unwrap_or(serde_json::json!({}));
    let synced_at: i64 = row.get("synced_at");

    println!("--- Ingredient ---");
    println!("id:           {}", row.get::<String, _>("id"));
    println!("external_id:  {}", row.get::<i64, _>("external_id"));
    println!("name:         {}", row.get::<String, _>("name"));
    println!("category:     {}", row.get::<String, _>("category"));
    println!("tags:         {}", tags);
    println!("dietary:      {}", dietary);
    println!("synced_at:    {}", format_ts_iso(synced_at));
    println!();

    println!("--- Nutrients (per 100g) ---");
    print_nutrient(&row, "calories", "kcal");
    print_nutrient(&row, "protein", "g");
    print_nutrient(&row, "carbs", "g");
    print_nutrient(&row, "fat", "g");
    print_nutrient(&row, "fiber", "g");
    print_nutrient(&row, "sugar", "g");
    print_nutrient(&row, "sodium", "mg");
    print_nutrient(&row, "calcium", "mg");
    print_nutrient(&row, "iron", "mg");
    print_nutrient(&row, "vitamin_c", "mg");

    pool.close().await;
    Ok(())
}

fn print_nutrient(row: &sqlx::sqlite::SqliteRow, column: &str, unit: &str) {
    match row.get::<Option<f64>, _>(column) {
        Some(amount) => println!("{:<12} {} {}", format!("{}:", column), amount, unit),
        None => println!("{:<12} -", format!("{}:", column)),
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
