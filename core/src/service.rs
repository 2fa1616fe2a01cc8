use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::catalog::{self, CatalogFood};
use crate::clock::{Clock, LocalDay, SystemClock};
use crate::db::Database;
use crate::error::{Result, TrackerError};
use crate::models::{
    DailyCalories, LoggedFoodEntry, MealItem, MealLogResult, NutritionProfile, ResetResult,
    UserProfile,
};
use crate::nutrition::{self, ActivityLevel, Biometrics, Gender, Goal, WeightCategory};
use crate::session::Session;
use crate::store::ProfileStore;
use crate::streak::SignInOutcome;

const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize)]
pub struct GoalOption {
    pub goal: Goal,
    pub label: &'static str,
    /// Daily calorie goal if this option is chosen.
    pub tdee: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub bmi: f64,
    pub category: WeightCategory,
    pub recommended: Goal,
    pub maintenance_tdee: f64,
    pub options: Vec<GoalOption>,
}

/// Fill in every value derivable from what the user has entered so far.
///
/// BMR stays empty until a gender is chosen, TDEE until an activity level is.
fn derive(n: &mut NutritionProfile) -> Result<()> {
    let (Some(age), Some(height_cm), Some(weight_kg)) = (n.age, n.height_cm, n.weight_kg) else {
        return Ok(());
    };
    let body = Biometrics {
        age,
        height_cm,
        weight_kg,
    };
    n.bmi = Some(body.bmi());
    n.bmr = n.gender.map(|g| body.bmr(g)).transpose()?;
    n.maintenance_tdee = match (n.bmr, n.activity_level) {
        (Some(bmr), Some(level)) => Some(nutrition::tdee(bmr, level)?),
        _ => None,
    };
    let goal = n.goal;
    n.tdee = n
        .maintenance_tdee
        .map(|m| goal.map_or(m, |g| g.apply(m)));
    Ok(())
}

pub struct WeighService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl WeighService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(Self::with_clock(
            Database::open(db_path)?,
            Arc::new(SystemClock),
        ))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::with_clock(
            Database::open_in_memory()?,
            Arc::new(SystemClock),
        ))
    }

    #[must_use]
    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(db),
            clock,
        }
    }

    #[must_use]
    pub fn today(&self) -> LocalDay {
        self.clock.today()
    }

    /// Start a tracking session. Must be called from within a Tokio runtime.
    pub fn start_session(&self, user_id: &str) -> Result<Session> {
        Session::start(self.db.clone(), user_id, self.clock.clone())
    }

    /// Feed writes made by other processes into the change feed, so sessions
    /// started from this service see them. Abort the handle to stop.
    pub fn follow_external_writes(&self) -> JoinHandle<()> {
        self.db.follow_external_writes(EXTERNAL_POLL_INTERVAL)
    }

    // --- Accounts ---

    pub fn register(&self, email: &str, username: &str, password: &str) -> Result<UserProfile> {
        self.db
            .register_account(email, username, password, self.clock.now())
    }

    /// Returns the user id for valid credentials.
    pub fn login(&self, email: &str, password: &str) -> Result<String> {
        self.db.authenticate(email, password)
    }

    pub fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.db.get_profile(user_id)
    }

    // --- Onboarding ---

    fn update_nutrition(
        &self,
        user_id: &str,
        edit: impl FnOnce(&mut NutritionProfile) -> Result<()>,
    ) -> Result<UserProfile> {
        let mut nutrition = self.db.get_profile(user_id)?.nutrition();
        edit(&mut nutrition)?;
        derive(&mut nutrition)?;
        self.db.save_nutrition(user_id, &nutrition, self.clock.now())
    }

    pub fn submit_survey(&self, user_id: &str, body: Biometrics) -> Result<UserProfile> {
        body.validate()?;
        self.update_nutrition(user_id, |n| {
            n.age = Some(body.age);
            n.height_cm = Some(body.height_cm);
            n.weight_kg = Some(body.weight_kg);
            Ok(())
        })
    }

    pub fn select_gender(&self, user_id: &str, gender: Gender) -> Result<UserProfile> {
        self.update_nutrition(user_id, |n| {
            if n.bmi.is_none() {
                return Err(TrackerError::InvalidInput(
                    "Complete the survey before choosing a gender".to_string(),
                ));
            }
            n.gender = Some(gender);
            Ok(())
        })
    }

    pub fn select_activity(&self, user_id: &str, level: ActivityLevel) -> Result<UserProfile> {
        self.update_nutrition(user_id, |n| {
            if n.bmr.is_none() {
                return Err(TrackerError::InvalidInput(
                    "BMR is required for TDEE calculation. Please select a gender first."
                        .to_string(),
                ));
            }
            n.activity_level = Some(level);
            Ok(())
        })
    }

    pub fn recommendation(&self, user_id: &str) -> Result<Recommendation> {
        let profile = self.db.get_profile(user_id)?;
        let (Some(bmi), Some(maintenance)) = (profile.bmi, profile.maintenance_tdee) else {
            return Err(TrackerError::InvalidInput(
                "Complete the survey, gender and activity steps first".to_string(),
            ));
        };
        let category = WeightCategory::from_bmi(bmi);
        Ok(Recommendation {
            bmi,
            category,
            recommended: category.recommended_goal(),
            maintenance_tdee: maintenance,
            options: Goal::ALL
                .iter()
                .map(|&goal| GoalOption {
                    goal,
                    label: goal.label(),
                    tdee: goal.apply(maintenance),
                })
                .collect(),
        })
    }

    pub fn choose_goal(&self, user_id: &str, goal: Goal) -> Result<UserProfile> {
        self.update_nutrition(user_id, |n| {
            if n.maintenance_tdee.is_none() {
                return Err(TrackerError::InvalidInput(
                    "Select an activity level before choosing a goal".to_string(),
                ));
            }
            n.goal = Some(goal);
            Ok(())
        })
    }

    // --- Tracking ---

    #[must_use]
    pub fn catalog(&self, query: Option<&str>) -> Vec<&'static CatalogFood> {
        match query {
            Some(q) => catalog::search(q),
            None => catalog::FOODS.iter().collect(),
        }
    }

    /// Resolve `(food id, quantity)` picks against the catalog.
    pub fn build_meal(&self, picks: &[(i64, Option<f64>)]) -> Result<Vec<MealItem>> {
        picks
            .iter()
            .map(|&(id, quantity)| MealItem::from_catalog(catalog::find(id)?, quantity))
            .collect()
    }

    pub fn log_meal(&self, user_id: &str, items: &[MealItem]) -> Result<MealLogResult> {
        self.db.log_meal(user_id, items, self.clock.now())
    }

    pub fn sign_in(&self, user_id: &str) -> Result<SignInOutcome> {
        self.db
            .record_sign_in(user_id, self.clock.now())
            .map(|r| r.outcome)
    }

    pub fn reset_if_stale(&self, user_id: &str) -> Result<ResetResult> {
        self.db.reset_progress_if_stale(user_id, self.clock.today())
    }

    pub fn history(&self, user_id: &str, days: Option<u32>) -> Result<Vec<DailyCalories>> {
        self.db.calorie_history(user_id, self.clock.today(), days)
    }

    pub fn entries_for_day(
        &self,
        user_id: &str,
        day: Option<LocalDay>,
    ) -> Result<Vec<LoggedFoodEntry>> {
        self.db
            .entries_for_day(user_id, day.unwrap_or_else(|| self.clock.today()))
    }
}
