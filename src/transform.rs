//! Source record normalization.
//!
//! Maps one provider food record into the ingredient schema: nutrient
//! extraction by numeric code, rule-based category mapping, dietary-flag
//! heuristics, tag generation, and searchable text. Pure — no I/O, total
//! over any input record (missing optional fields become absent values,
//! never errors).
//!
//! The nutrient code→field mappings and category tables are module data,
//! not branching logic: the provider renumbered its nutrient codes
//! between API generations, and keeping both sets as tables makes a
//! provider change a data update.

use chrono::{DateTime, Utc};

use crate::models::{DietaryFlags, NormalizedIngredient, Nutrients, SourceFood};

/// Display names longer than this are truncated with a trailing ellipsis.
pub const MAX_NAME_LEN: usize = 500;

/// Maximum number of generated tags per ingredient.
pub const MAX_TAGS: usize = 10;

/// Which provider nutrient-code table applies to the responses being
/// ingested. The two generations use disjoint numeric encodings; the
/// active set is a configuration choice and the tables are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NutrientCodes {
    /// Current API generation (1008 = energy, 1003 = protein, ...).
    Fdc,
    /// Older nutrient-number encoding (208 = energy, 203 = protein, ...).
    Legacy,
}

impl NutrientCodes {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fdc" => Some(NutrientCodes::Fdc),
            "legacy" => Some(NutrientCodes::Legacy),
            _ => None,
        }
    }

    fn table(self) -> &'static [(i64, NutrientField)] {
        match self {
            NutrientCodes::Fdc => FDC_CODES,
            NutrientCodes::Legacy => LEGACY_CODES,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum NutrientField {
    Calories,
    Protein,
    Carbs,
    Fat,
    Fiber,
    Sugar,
    Sodium,
    Calcium,
    Iron,
    VitaminC,
}

const FDC_CODES: &[(i64, NutrientField)] = &[
    (1008, NutrientField::Calories),
    (1003, NutrientField::Protein),
    (1005, NutrientField::Carbs),
    (1004, NutrientField::Fat),
    (1079, NutrientField::Fiber),
    (2000, NutrientField::Sugar),
    (1093, NutrientField::Sodium),
    (1087, NutrientField::Calcium),
    (1089, NutrientField::Iron),
    (1162, NutrientField::VitaminC),
];

const LEGACY_CODES: &[(i64, NutrientField)] = &[
    (208, NutrientField::Calories),
    (203, NutrientField::Protein),
    (205, NutrientField::Carbs),
    (204, NutrientField::Fat),
    (291, NutrientField::Fiber),
    (269, NutrientField::Sugar),
    (307, NutrientField::Sodium),
    (301, NutrientField::Calcium),
    (303, NutrientField::Iron),
    (401, NutrientField::VitaminC),
];

/// Curated mapping from the provider's food-group names (lowercased) to
/// the application's category vocabulary. Unmapped groups pass through
/// unchanged.
const CATEGORY_MAP: &[(&str, &str)] = &[
    ("dairy and egg products", "dairy"),
    ("spices and herbs", "condiments"),
    ("fats and oils", "fats"),
    ("poultry products", "meat"),
    ("soups, sauces, and gravies", "condiments"),
    ("sausages and luncheon meats", "meat"),
    ("breakfast cereals", "grains"),
    ("fruits and fruit juices", "fruits"),
    ("pork products", "meat"),
    ("vegetables and vegetable products", "vegetables"),
    ("nut and seed products", "nuts"),
    ("beef products", "meat"),
    ("beverages", "beverages"),
    ("finfish and shellfish products", "seafood"),
    ("legumes and legume products", "legumes"),
    ("lamb, veal, and game products", "meat"),
    ("baked products", "baked"),
    ("sweets", "sweets"),
    ("cereal grains and pasta", "grains"),
    ("fast foods", "prepared"),
    ("meals, entrees, and side dishes", "prepared"),
    ("snacks", "snacks"),
    ("restaurant foods", "prepared"),
    ("baby foods", "baby"),
];

/// Default category per provider classification, used when a record
/// carries no food group at all.
const DATA_TYPE_DEFAULTS: &[(&str, &str)] = &[
    ("foundation", "whole foods"),
    ("sr legacy", "generic"),
    ("survey (fndds)", "survey"),
    ("branded", "packaged"),
    ("experimental", "experimental"),
];

/// Categories treated as unprocessed plant foods for flag derivation.
const PLANT_CATEGORIES: &[&str] = &["vegetables", "fruits", "legumes", "nuts"];

const DAIRY_KEYWORDS: &[&str] = &[
    "milk", "cheese", "butter", "cream", "whey", "casein", "yogurt", "lactose",
];
const GLUTEN_KEYWORDS: &[&str] = &["wheat", "barley", "rye", "malt", "semolina", "flour"];
const EGG_KEYWORDS: &[&str] = &["egg"];
const SOY_KEYWORDS: &[&str] = &["soy", "tofu", "edamame"];
const MEAT_KEYWORDS: &[&str] = &[
    "beef", "pork", "chicken", "turkey", "lamb", "bacon", "fish", "anchov", "gelatin", "lard",
];

/// Normalize one provider record. Total: never fails, whatever the input.
pub fn transform(food: &SourceFood, codes: NutrientCodes, now: DateTime<Utc>) -> NormalizedIngredient {
    let name = truncate_name(&food.description);
    let category = derive_category(food);
    let nutrients = extract_nutrients(food, codes);
    let dietary = derive_flags(&category, food);
    let tags = build_tags(food, &category);
    let search_text = build_search_text(&name, &category, food, &tags);

    NormalizedIngredient {
        external_id: food.fdc_id,
        name,
        category,
        nutrients,
        tags,
        dietary,
        search_text,
        synced_at: now,
    }
}

/// Truncate to [`MAX_NAME_LEN`] chars, replacing the tail with `...` when
/// over. Char-based so multibyte descriptions never split a codepoint.
fn truncate_name(description: &str) -> String {
    if description.chars().count() <= MAX_NAME_LEN {
        return description.to_string();
    }
    let mut name: String = description.chars().take(MAX_NAME_LEN - 3).collect();
    name.push_str("...");
    name
}

fn extract_nutrients(food: &SourceFood, codes: NutrientCodes) -> Nutrients {
    let table = codes.table();
    let mut nutrients = Nutrients::default();

    for entry in &food.food_nutrients {
        let amount = match entry.amount {
            Some(a) => a,
            None => continue,
        };
        // Unknown codes are ignored — the table is closed per generation.
        let field = table
            .iter()
            .find(|(code, _)| *code == entry.nutrient_id)
            .map(|(_, field)| *field);
        match field {
            Some(NutrientField::Calories) => nutrients.calories = Some(amount),
            Some(NutrientField::Protein) => nutrients.protein = Some(amount),
            Some(NutrientField::Carbs) => nutrients.carbs = Some(amount),
            Some(NutrientField::Fat) => nutrients.fat = Some(amount),
            Some(NutrientField::Fiber) => nutrients.fiber = Some(amount),
            Some(NutrientField::Sugar) => nutrients.sugar = Some(amount),
            Some(NutrientField::Sodium) => nutrients.sodium = Some(amount),
            Some(NutrientField::Calcium) => nutrients.calcium = Some(amount),
            Some(NutrientField::Iron) => nutrients.iron = Some(amount),
            Some(NutrientField::VitaminC) => nutrients.vitamin_c = Some(amount),
            None => {}
        }
    }

    nutrients
}

fn derive_category(food: &SourceFood) -> String {
    if let Some(ref group) = food.food_category {
        let lowered = group.to_lowercase();
        return CATEGORY_MAP
            .iter()
            .find(|(from, _)| *from == lowered)
            .map(|(_, to)| to.to_string())
            .unwrap_or(lowered);
    }

    let data_type = food.data_type.to_lowercase();
    DATA_TYPE_DEFAULTS
        .iter()
        .find(|(dt, _)| *dt == data_type)
        .map(|(_, cat)| cat.to_string())
        .unwrap_or_else(|| "other".to_string())
}

fn derive_flags(category: &str, food: &SourceFood) -> DietaryFlags {
    let plant = PLANT_CATEGORIES.contains(&category);
    let mut flags = DietaryFlags {
        vegan: plant,
        vegetarian: plant,
        gluten_free: plant,
        dairy_free: plant,
        egg_free: plant,
        soy_free: plant,
    };

    let text = match food.ingredients {
        Some(ref t) if !t.trim().is_empty() => t.to_lowercase(),
        _ => return flags,
    };

    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
    let dairy = has(DAIRY_KEYWORDS);
    let gluten = has(GLUTEN_KEYWORDS);
    let egg = has(EGG_KEYWORDS);
    let soy = has(SOY_KEYWORDS);
    let meat = has(MEAT_KEYWORDS);

    flags.dairy_free = !dairy;
    flags.gluten_free = !gluten;
    flags.egg_free = !egg;
    flags.soy_free = !soy;
    flags.vegetarian = !meat;
    flags.vegan = !(meat || dairy || egg);

    flags
}

fn build_tags(food: &SourceFood, category: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    let mut push = |value: &str| {
        let slugged = slug(value);
        if !slugged.is_empty() && !tags.contains(&slugged) && tags.len() < MAX_TAGS {
            tags.push(slugged);
        }
    };

    push(&food.data_type);
    push(category);
    if let Some(ref brand) = food.brand_owner {
        push(brand);
    }
    if let Some(ref scientific) = food.scientific_name {
        for token in scientific.split_whitespace() {
            push(token);
        }
    }

    tags
}

/// Lowercase, with runs of non-alphanumeric characters collapsed to `-`.
fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_dash = true;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn build_search_text(name: &str, category: &str, food: &SourceFood, tags: &[String]) -> String {
    let mut parts: Vec<String> = vec![name.to_lowercase(), category.to_lowercase()];
    if let Some(ref brand) = food.brand_owner {
        parts.push(brand.to_lowercase());
    }
    if let Some(ref scientific) = food.scientific_name {
        parts.push(scientific.to_lowercase());
    }
    for tag in tags {
        parts.push(tag.clone());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodNutrient;

    fn minimal(fdc_id: i64, description: &str) -> SourceFood {
        SourceFood {
            fdc_id,
            description: description.to_string(),
            data_type: "Foundation".to_string(),
            food_category: None,
            brand_owner: None,
            ingredients: None,
            serving_size: None,
            serving_size_unit: None,
            scientific_name: None,
            food_nutrients: Vec::new(),
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn transform_is_total_on_minimal_record() {
        let ing = transform(&minimal(1, "Salt"), NutrientCodes::Fdc, now());
        assert_eq!(ing.external_id, 1);
        assert_eq!(ing.name, "Salt");
        assert_eq!(ing.nutrients, Nutrients::default());
        assert!(!ing.tags.is_empty());
        assert!(!ing.search_text.is_empty());
    }

    #[test]
    fn truncates_at_boundary() {
        let at_limit = "x".repeat(500);
        let over_limit = "x".repeat(501);

        let kept = transform(&minimal(1, &at_limit), NutrientCodes::Fdc, now());
        assert_eq!(kept.name.chars().count(), 500);
        assert!(!kept.name.ends_with("..."));

        let cut = transform(&minimal(2, &over_limit), NutrientCodes::Fdc, now());
        assert_eq!(cut.name.chars().count(), 500);
        assert!(cut.name.ends_with("..."));
        assert_eq!(cut.name.chars().take(497).count(), 497);
    }

    #[test]
    fn extracts_fdc_codes_and_ignores_unknown() {
        let mut food = minimal(10, "Lentils");
        food.food_nutrients = vec![
            FoodNutrient {
                nutrient_id: 1008,
                amount: Some(116.0),
            },
            FoodNutrient {
                nutrient_id: 1003,
                amount: Some(9.0),
            },
            FoodNutrient {
                nutrient_id: 9999,
                amount: Some(42.0),
            },
            FoodNutrient {
                nutrient_id: 1162,
                amount: None,
            },
        ];

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert_eq!(ing.nutrients.calories, Some(116.0));
        assert_eq!(ing.nutrients.protein, Some(9.0));
        assert_eq!(ing.nutrients.vitamin_c, None);
        assert_eq!(ing.nutrients.fat, None);
    }

    #[test]
    fn legacy_codes_are_a_separate_table() {
        let mut food = minimal(11, "Oats");
        food.food_nutrients = vec![FoodNutrient {
            nutrient_id: 208,
            amount: Some(389.0),
        }];

        let legacy = transform(&food, NutrientCodes::Legacy, now());
        assert_eq!(legacy.nutrients.calories, Some(389.0));

        // The same record under the fdc table yields nothing — the sets
        // are disjoint, never merged.
        let fdc = transform(&food, NutrientCodes::Fdc, now());
        assert_eq!(fdc.nutrients.calories, None);
    }

    #[test]
    fn category_mapping_and_fallbacks() {
        let mut mapped = minimal(20, "Cheddar");
        mapped.food_category = Some("Dairy and Egg Products".to_string());
        assert_eq!(
            transform(&mapped, NutrientCodes::Fdc, now()).category,
            "dairy"
        );

        let mut passthrough = minimal(21, "Mystery");
        passthrough.food_category = Some("Novel Foods".to_string());
        assert_eq!(
            transform(&passthrough, NutrientCodes::Fdc, now()).category,
            "novel foods"
        );

        let mut by_data_type = minimal(22, "Branded thing");
        by_data_type.data_type = "Branded".to_string();
        assert_eq!(
            transform(&by_data_type, NutrientCodes::Fdc, now()).category,
            "packaged"
        );

        let mut unknown = minimal(23, "Odd");
        unknown.data_type = "Mystery Type".to_string();
        assert_eq!(transform(&unknown, NutrientCodes::Fdc, now()).category, "other");
    }

    #[test]
    fn plant_categories_imply_positive_flags() {
        let mut food = minimal(30, "Spinach, raw");
        food.food_category = Some("Vegetables and Vegetable Products".to_string());

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert!(ing.dietary.vegan);
        assert!(ing.dietary.vegetarian);
        assert!(ing.dietary.gluten_free);
        assert!(ing.dietary.dairy_free);
    }

    #[test]
    fn allergen_scan_overrides_flags() {
        let mut food = minimal(31, "Cookies");
        food.data_type = "Branded".to_string();
        food.ingredients = Some("WHEAT FLOUR, MILK, EGGS, SOY LECITHIN".to_string());

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert!(!ing.dietary.gluten_free);
        assert!(!ing.dietary.dairy_free);
        assert!(!ing.dietary.egg_free);
        assert!(!ing.dietary.soy_free);
        assert!(!ing.dietary.vegan);
        assert!(ing.dietary.vegetarian);
    }

    #[test]
    fn clean_ingredient_list_clears_allergen_flags() {
        let mut food = minimal(32, "Rice crackers");
        food.data_type = "Branded".to_string();
        food.ingredients = Some("rice, salt, sunflower oil".to_string());

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert!(ing.dietary.gluten_free);
        assert!(ing.dietary.dairy_free);
        assert!(ing.dietary.vegan);
    }

    #[test]
    fn tags_are_slugged_deduped_and_capped() {
        let mut food = minimal(40, "Salmon");
        food.data_type = "SR Legacy".to_string();
        food.food_category = Some("Finfish and Shellfish Products".to_string());
        food.brand_owner = Some("Ocean & Co.".to_string());
        food.scientific_name = Some("Salmo salar one two three four five six seven".to_string());

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert!(ing.tags.len() <= MAX_TAGS);
        assert!(ing.tags.contains(&"sr-legacy".to_string()));
        assert!(ing.tags.contains(&"seafood".to_string()));
        assert!(ing.tags.contains(&"ocean-co".to_string()));
        assert!(ing.tags.contains(&"salmo".to_string()));
    }

    #[test]
    fn search_text_is_lowercase_and_composite() {
        let mut food = minimal(50, "Greek Yogurt");
        food.food_category = Some("Dairy and Egg Products".to_string());
        food.brand_owner = Some("FAGE".to_string());

        let ing = transform(&food, NutrientCodes::Fdc, now());
        assert!(ing.search_text.contains("greek yogurt"));
        assert!(ing.search_text.contains("dairy"));
        assert!(ing.search_text.contains("fage"));
        assert_eq!(ing.search_text, ing.search_text.to_lowercase());
    }
}
