//! One-record provider probe.
//!
//! Fetches a single food from the provider's detail endpoint, runs it
//! through the transformer, and prints the normalized result as JSON —
//! without writing to the database. Useful for checking credentials,
//! nutrient-code table selection, and category mapping before committing
//! to a full run.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::Config;
use crate::fetch::FetchClient;
use crate::transform::{transform, NutrientCodes};

pub async fn run_probe(config: &Config, external_id: i64) -> Result<()> {
    let fetcher = FetchClient::new(&config.api)?;
    let codes = NutrientCodes::from_name(&config.api.nutrient_codes)
        .context("invalid nutrient code table")?;

    let food = fetcher
        .fetch_food(external_id)
        .await
        .with_context(|| format!("failed to fetch food {}", external_id))?;

    let ingredient = transform(&food, codes, Utc::now());

    println!("probe {} (dry-run, nothing written)", external_id);
    println!("{}", serde_json::to_string_pretty(&ingredient)?);
    Ok(())
}
