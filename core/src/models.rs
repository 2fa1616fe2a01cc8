use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogFood;
use crate::clock::LocalDay;
use crate::error::{Result, TrackerError};
use crate::nutrition::{ActivityLevel, Gender, Goal};
use crate::progress::Progress;
use crate::streak::{SignInOutcome, SignInState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub age: Option<u32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub gender: Option<Gender>,
    pub bmr: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    /// TDEE before any lose/gain adjustment.
    pub maintenance_tdee: Option<f64>,
    pub goal: Option<Goal>,
    /// Daily calorie goal.
    pub tdee: Option<f64>,
    pub progress: f64,
    pub progress_day: Option<LocalDay>,
    pub streak: u32,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub login_dates: BTreeSet<LocalDay>,
    pub created_at: String,
    pub updated_at: String,
    /// Bumped by every committed write to the row.
    pub revision: u64,
}

impl UserProfile {
    #[must_use]
    pub fn sign_in_state(&self) -> SignInState {
        SignInState {
            last_sign_in: self.last_sign_in,
            streak: self.streak,
            login_dates: self.login_dates.clone(),
        }
    }

    #[must_use]
    pub fn daily_progress(&self) -> Progress {
        Progress::new(self.progress, self.progress_day)
    }

    #[must_use]
    pub fn nutrition(&self) -> NutritionProfile {
        NutritionProfile {
            age: self.age,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            bmi: self.bmi,
            gender: self.gender,
            bmr: self.bmr,
            activity_level: self.activity_level,
            maintenance_tdee: self.maintenance_tdee,
            goal: self.goal,
            tdee: self.tdee,
        }
    }

    #[must_use]
    pub fn tracked_fields(&self) -> TrackedFields {
        TrackedFields {
            tdee: self.tdee.unwrap_or(0.0),
            progress: self.progress,
            progress_day: self.progress_day,
            streak: self.streak,
            last_sign_in: self.last_sign_in,
            login_dates: self.login_dates.clone(),
            revision: self.revision,
        }
    }
}

/// Survey and goal fields, written together by the onboarding flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NutritionProfile {
    pub age: Option<u32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub gender: Option<Gender>,
    pub bmr: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub maintenance_tdee: Option<f64>,
    pub goal: Option<Goal>,
    pub tdee: Option<f64>,
}

/// The profile fields a tracking session mirrors. Change events carry these
/// values directly so a subscriber never has to re-read the row.
///
/// `revision` orders snapshots of the same profile: a higher revision was
/// committed later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedFields {
    pub tdee: f64,
    pub progress: f64,
    pub progress_day: Option<LocalDay>,
    pub streak: u32,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub login_dates: BTreeSet<LocalDay>,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Onboarding,
    SignIn,
    ProgressReset,
    MealLogged,
    /// Committed through another connection to the same database file.
    External,
}

/// A committed write to a profile, published on the store's change feed.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileChange {
    pub user_id: String,
    pub kind: ChangeKind,
    pub fields: TrackedFields,
}

/// A food picked for the current meal, not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct MealItem {
    pub food_id: i64,
    pub food_name: String,
    pub calories: f64,
    pub quantity: f64,
}

impl MealItem {
    /// Build from a catalog entry. A missing quantity counts as one portion.
    pub fn from_catalog(food: &CatalogFood, quantity: Option<f64>) -> Result<Self> {
        let quantity = quantity.unwrap_or(1.0);
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(TrackerError::InvalidInput(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            food_id: food.id,
            food_name: food.name.to_string(),
            calories: food.calories,
            quantity,
        })
    }

    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.calories * self.quantity
    }
}

#[must_use]
pub fn meal_total(items: &[MealItem]) -> f64 {
    items.iter().map(MealItem::subtotal).sum()
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedFoodEntry {
    pub id: i64,
    pub uuid: String,
    pub user_id: String,
    pub food_id: i64,
    pub food_name: String,
    pub calories: f64,
    pub quantity: f64,
    pub subtotal: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealLogResult {
    pub entries: Vec<LoggedFoodEntry>,
    pub total_calories: f64,
    pub progress: f64,
    /// Whether the day rolled over before the meal was added.
    pub rolled_over: bool,
    pub fields: TrackedFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInResult {
    pub outcome: SignInOutcome,
    /// The committed values, or the current ones when the sign-in was denied.
    pub fields: TrackedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCalories {
    pub date: LocalDay,
    pub calories: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetResult {
    pub reset: bool,
    pub fields: TrackedFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_meal_item_defaults_to_one_portion() {
        let item = MealItem::from_catalog(catalog::find(7).unwrap(), None).unwrap();
        assert!((item.quantity - 1.0).abs() < f64::EPSILON);
        assert!((item.subtotal() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_meal_item_rejects_bad_quantity() {
        let banana = catalog::find(7).unwrap();
        assert!(MealItem::from_catalog(banana, Some(0.0)).is_err());
        assert!(MealItem::from_catalog(banana, Some(-2.0)).is_err());
        assert!(MealItem::from_catalog(banana, Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_meal_total() {
        let items = vec![
            MealItem::from_catalog(catalog::find(1).unwrap(), Some(2.0)).unwrap(),
            MealItem::from_catalog(catalog::find(7).unwrap(), Some(0.5)).unwrap(),
        ];
        assert!((meal_total(&items) - 545.0).abs() < f64::EPSILON);
    }
}
