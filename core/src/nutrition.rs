use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Daily calorie adjustment applied for a lose/gain goal.
pub const GOAL_ADJUSTMENT_KCAL: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => Err(TrackerError::InvalidInput(format!(
                "Invalid gender: {s}. Use male or female"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    LessActive,
    LightlyActive,
    Active,
    VeryActive,
    ExtraActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        Self::LessActive,
        Self::LightlyActive,
        Self::Active,
        Self::VeryActive,
        Self::ExtraActive,
    ];

    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::LessActive => 1.2,
            Self::LightlyActive => 1.375,
            Self::Active => 1.55,
            Self::VeryActive => 1.725,
            Self::ExtraActive => 1.9,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LessActive => "less_active",
            Self::LightlyActive => "lightly_active",
            Self::Active => "active",
            Self::VeryActive => "very_active",
            Self::ExtraActive => "extra_active",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::LessActive => "Office worker, student",
            Self::LightlyActive => "Casual walker, occasional workouts",
            Self::Active => "Regular gym-goer, light physical job",
            Self::VeryActive => "Athlete, manual laborer, fitness enthusiast",
            Self::ExtraActive => "Construction worker, soldier, professional athlete",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLevel {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "less_active" | "sedentary" | "1" => Ok(Self::LessActive),
            "lightly_active" | "light" | "2" => Ok(Self::LightlyActive),
            "active" | "3" => Ok(Self::Active),
            "very_active" | "4" => Ok(Self::VeryActive),
            "extra_active" | "5" => Ok(Self::ExtraActive),
            _ => Err(TrackerError::InvalidInput(format!(
                "Invalid activity level: {s}. Use less_active, lightly_active, active, very_active or extra_active"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl Goal {
    pub const ALL: [Goal; 3] = [Self::Lose, Self::Maintain, Self::Gain];

    #[must_use]
    pub fn adjustment(self) -> f64 {
        match self {
            Self::Lose => -GOAL_ADJUSTMENT_KCAL,
            Self::Maintain => 0.0,
            Self::Gain => GOAL_ADJUSTMENT_KCAL,
        }
    }

    /// Daily calorie goal for this goal on top of a maintenance TDEE.
    #[must_use]
    pub fn apply(self, maintenance_tdee: f64) -> f64 {
        round2((maintenance_tdee + self.adjustment()).max(0.0))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lose => "lose",
            Self::Maintain => "maintain",
            Self::Gain => "gain",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Lose => "Lose Weight",
            Self::Maintain => "Maintain Weight",
            Self::Gain => "Gain Weight",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lose" => Ok(Self::Lose),
            "maintain" => Ok(Self::Maintain),
            "gain" => Ok(Self::Gain),
            _ => Err(TrackerError::InvalidInput(format!(
                "Invalid goal: {s}. Use lose, maintain or gain"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl WeightCategory {
    #[must_use]
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 25.0 {
            Self::Normal
        } else if bmi < 30.0 {
            Self::Overweight
        } else {
            Self::Obese
        }
    }

    #[must_use]
    pub fn recommended_goal(self) -> Goal {
        match self {
            Self::Underweight => Goal::Gain,
            Self::Normal => Goal::Maintain,
            Self::Overweight | Self::Obese => Goal::Lose,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Underweight => "UNDERWEIGHT",
            Self::Normal => "NORMAL",
            Self::Overweight => "OVERWEIGHT",
            Self::Obese => "OBESE",
        }
    }
}

impl fmt::Display for WeightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Survey inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
}

impl Biometrics {
    pub fn validate(&self) -> Result<()> {
        if self.age == 0 {
            return Err(TrackerError::InvalidInput(
                "Age must be greater than zero".to_string(),
            ));
        }
        if !self.height_cm.is_finite() || self.height_cm <= 0.0 {
            return Err(TrackerError::InvalidInput(
                "Height must be greater than zero".to_string(),
            ));
        }
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(TrackerError::InvalidInput(
                "Weight must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// BMI rounded to two decimals.
    #[must_use]
    pub fn bmi(&self) -> f64 {
        bmi(self.weight_kg, self.height_cm)
    }

    pub fn bmr(&self, gender: Gender) -> Result<f64> {
        let value = bmr(gender, self.weight_kg, self.height_cm, self.age);
        if !value.is_finite() || value <= 0.0 {
            return Err(TrackerError::InvalidInput(
                "BMR calculation failed. Please check your input values.".to_string(),
            ));
        }
        Ok(value)
    }
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    round2(weight_kg / (height_m * height_m))
}

/// Mifflin-St Jeor basal metabolic rate.
#[must_use]
pub fn bmr(gender: Gender, weight_kg: f64, height_cm: f64, age: u32) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

/// Maintenance TDEE rounded to two decimals.
pub fn tdee(bmr: f64, level: ActivityLevel) -> Result<f64> {
    if !bmr.is_finite() || bmr <= 0.0 {
        return Err(TrackerError::InvalidInput(
            "BMR is required for TDEE calculation. Please select a gender first.".to_string(),
        ));
    }
    Ok(round2(bmr * level.multiplier()))
}

/// Calories split 20/30/50 across protein, fats and carbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MacroBreakdown {
    pub protein: i64,
    pub fats: i64,
    pub carbs: i64,
}

impl MacroBreakdown {
    /// Split consumed calories, capped at the daily goal.
    #[must_use]
    pub fn of(progress: f64, tdee: f64) -> Self {
        let capped = progress.min(tdee).max(0.0);
        Self {
            protein: (capped * 0.2).round() as i64,
            fats: (capped * 0.3).round() as i64,
            carbs: (capped * 0.5).round() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Biometrics {
        Biometrics {
            age: 30,
            height_cm: 170.0,
            weight_kg: 70.0,
        }
    }

    #[test]
    fn test_bmi_rounded() {
        assert!((sample().bmi() - 24.22).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bmr_male() {
        // 10*70 + 6.25*170 - 5*30 + 5
        let value = sample().bmr(Gender::Male).unwrap();
        assert!((value - 1617.5).abs() < 1e-9);
    }

    #[test]
    fn test_bmr_female() {
        let value = sample().bmr(Gender::Female).unwrap();
        assert!((value - 1451.5).abs() < 1e-9);
    }

    #[test]
    fn test_tdee_active() {
        let t = tdee(1617.5, ActivityLevel::Active).unwrap();
        assert_eq!(t, round2(1617.5 * 1.55));
        assert!((t - 2507.125).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn test_tdee_multipliers() {
        let expected = [1200.0, 1375.0, 1550.0, 1725.0, 1900.0];
        for (level, want) in ActivityLevel::ALL.iter().zip(expected) {
            let got = tdee(1000.0, *level).unwrap();
            assert!((got - want).abs() < 1e-9, "{level}");
        }
    }

    #[test]
    fn test_tdee_requires_bmr() {
        assert!(matches!(
            tdee(0.0, ActivityLevel::Active),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bmr_rejects_nonsense() {
        let tiny = Biometrics {
            age: 120,
            height_cm: 10.0,
            weight_kg: 1.0,
        };
        assert!(tiny.bmr(Gender::Female).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());
        let mut b = sample();
        b.age = 0;
        assert!(b.validate().is_err());
        let mut b = sample();
        b.height_cm = -1.0;
        assert!(b.validate().is_err());
        let mut b = sample();
        b.weight_kg = f64::NAN;
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_weight_category_boundaries() {
        assert_eq!(WeightCategory::from_bmi(18.49), WeightCategory::Underweight);
        assert_eq!(WeightCategory::from_bmi(18.5), WeightCategory::Normal);
        assert_eq!(WeightCategory::from_bmi(24.99), WeightCategory::Normal);
        assert_eq!(WeightCategory::from_bmi(25.0), WeightCategory::Overweight);
        assert_eq!(WeightCategory::from_bmi(30.0), WeightCategory::Obese);
    }

    #[test]
    fn test_recommended_goal() {
        assert_eq!(WeightCategory::Underweight.recommended_goal(), Goal::Gain);
        assert_eq!(WeightCategory::Normal.recommended_goal(), Goal::Maintain);
        assert_eq!(WeightCategory::Obese.recommended_goal(), Goal::Lose);
    }

    #[test]
    fn test_goal_apply() {
        assert!((Goal::Lose.apply(2466.83) - 1966.83).abs() < 1e-9);
        assert!((Goal::Gain.apply(2466.83) - 2966.83).abs() < 1e-9);
        assert!((Goal::Maintain.apply(2466.83) - 2466.83).abs() < 1e-9);
        assert!(Goal::Lose.apply(300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_macros_capped_at_goal() {
        let m = MacroBreakdown::of(3000.0, 2000.0);
        assert_eq!(m, MacroBreakdown { protein: 400, fats: 600, carbs: 1000 });
        let m = MacroBreakdown::of(455.0, 2000.0);
        assert_eq!(m, MacroBreakdown { protein: 91, fats: 137, carbs: 228 });
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("f".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(
            "very-active".parse::<ActivityLevel>().unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!("3".parse::<ActivityLevel>().unwrap(), ActivityLevel::Active);
        assert_eq!("GAIN".parse::<Goal>().unwrap(), Goal::Gain);
        assert!("couch".parse::<ActivityLevel>().is_err());
    }
}
