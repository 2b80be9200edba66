//! Core data models used throughout FoodData Sync.
//!
//! These types represent the provider records, normalized ingredients,
//! and page payloads that flow through the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of search results from the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPage {
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    #[allow(dead_code)]
    pub total_pages: u32,
    #[serde(default)]
    pub foods: Vec<SourceFood>,
}

/// Raw food record as returned by the provider. Immutable once fetched;
/// the pipeline never mutates it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFood {
    pub fdc_id: i64,
    pub description: String,
    pub data_type: String,
    #[serde(default)]
    pub food_category: Option<String>,
    #[serde(default)]
    pub brand_owner: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub serving_size: Option<f64>,
    #[serde(default)]
    #[allow(dead_code)]
    pub serving_size_unit: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

/// One `(nutrient code, amount)` pair from a food record. The search
/// endpoint calls the amount `value`; the detail endpoint calls it
/// `amount` — accept both.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodNutrient {
    #[serde(alias = "nutrientId")]
    pub nutrient_id: i64,
    #[serde(default, alias = "value")]
    pub amount: Option<f64>,
}

/// The ten nutrient fields extracted per ingredient, each absent when
/// the source record lacks the corresponding code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub calcium: Option<f64>,
    pub iron: Option<f64>,
    pub vitamin_c: Option<f64>,
}

/// Best-effort dietary annotations, derived from category heuristics and
/// an allergen keyword scan. Never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietaryFlags {
    pub vegan: bool,
    pub vegetarian: bool,
    pub gluten_free: bool,
    pub dairy_free: bool,
    pub egg_free: bool,
    pub soy_free: bool,
}

/// Normalized ingredient written to the store, derived deterministically
/// from one [`SourceFood`]. `external_id` uniquely determines at most one
/// stored row — re-ingesting the same id updates, never duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedIngredient {
    pub external_id: i64,
    pub name: String,
    pub category: String,
    pub nutrients: Nutrients,
    pub tags: Vec<String>,
    pub dietary: DietaryFlags,
    pub search_text: String,
    pub synced_at: DateTime<Utc>,
}
