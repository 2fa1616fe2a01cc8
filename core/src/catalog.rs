use serde::Serialize;

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogFood {
    pub id: i64,
    pub name: &'static str,
    /// Calories for one unit of the listed portion.
    pub calories: f64,
}

const fn food(id: i64, name: &'static str, calories: f64) -> CatalogFood {
    CatalogFood { id, name, calories }
}

pub const FOODS: &[CatalogFood] = &[
    food(1, "Grilled Chicken Breast (150g)", 250.0),
    food(2, "Quinoa Salad", 120.0),
    food(3, "Steamed Broccoli", 55.0),
    food(4, "Greek Yogurt", 100.0),
    food(5, "Almonds (1 oz)", 160.0),
    food(6, "3 Whole eggs", 210.0),
    food(7, "1 Banana", 90.0),
    food(8, "1 Glass of Milk (250ml)", 150.0),
    food(9, "Peanut Butter (2 tbsp)", 190.0),
    food(10, "Whole-grain Bread (2 slices)", 160.0),
    food(11, "1 cup Oatmeal (cooked)", 150.0),
    food(12, "Honey (1 tbsp)", 60.0),
    food(13, "Chia seeds (1 tbsp)", 60.0),
    food(14, "1 Glass of Milk (200ml)", 120.0),
    food(15, "1 cup Mix Vegetables", 80.0),
    food(16, "1 cup Cooked Brown Rice", 215.0),
    food(17, "Olive Oil (1 tbsp)", 120.0),
    food(18, "1/2 Avocado", 120.0),
    food(19, "Lean Ground Beef (100g)", 250.0),
    food(20, "1 cup Cooked Pasta", 200.0),
    food(21, "1/2 cup Tomato Sauce", 60.0),
    food(22, "Grated Cheese (1 tbsp)", 40.0),
    food(23, "Mixed Nuts (30g)", 180.0),
    food(24, "2 Boiled Eggs", 140.0),
    food(25, "1 slice Whole-grain Toast", 80.0),
    food(26, "1 cup Mixed Greens", 40.0),
    food(27, "1 cup Low-fat Yogurt", 100.0),
    food(28, "1/4 cup Few Berries", 25.0),
    food(29, "Baked Salmon (100g)", 200.0),
    food(30, "1/2 cup Brown Rice", 110.0),
    food(31, "1 cup Broccoli + Carrots", 55.0),
    food(32, "1 cup Broccoli", 40.0),
    food(33, "Fish Tilapia/Salmon (120g)", 200.0),
    food(34, "1 cup Mashed Potatoes", 180.0),
    food(35, "1 cup Milk", 150.0),
    food(36, "1 slice Cheese", 100.0),
    food(37, "100g Grilled Chicken", 120.0),
    food(38, "1/2 cup Cooked Rice", 120.0),
];

pub fn find(id: i64) -> Result<&'static CatalogFood> {
    FOODS
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| TrackerError::InvalidInput(format!("No food with id {id} in the catalog")))
}

/// Case-insensitive substring search over food names.
#[must_use]
pub fn search(query: &str) -> Vec<&'static CatalogFood> {
    let needle = query.trim().to_lowercase();
    FOODS
        .iter()
        .filter(|f| f.name.to_lowercase().contains(&needle))
        .collect()
}
