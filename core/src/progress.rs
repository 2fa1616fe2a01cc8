use serde::{Deserialize, Serialize};

use crate::clock::LocalDay;

/// Whether accumulated progress still belongs to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    Fresh,
    Stale,
}

/// Compare the last progress-affecting day against today.
///
/// A profile that has never recorded progress is `Fresh` as long as it has
/// nothing to reset.
#[must_use]
pub fn day_state(last_activity: Option<LocalDay>, progress: f64, today: LocalDay) -> DayState {
    match last_activity {
        Some(day) if day == today => DayState::Fresh,
        Some(_) => DayState::Stale,
        None if progress > 0.0 => DayState::Stale,
        None => DayState::Fresh,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Calories consumed since the last reset.
    pub calories: f64,
    pub day: Option<LocalDay>,
}

impl Progress {
    #[must_use]
    pub fn new(calories: f64, day: Option<LocalDay>) -> Self {
        Self { calories, day }
    }

    #[must_use]
    pub fn state(&self, today: LocalDay) -> DayState {
        day_state(self.day, self.calories, today)
    }

    /// Zero the progress if the day rolled over. Returns true when a reset happened.
    ///
    /// Running it again with the same `today` does nothing.
    pub fn reset_if_stale(&mut self, today: LocalDay) -> bool {
        if self.state(today) == DayState::Fresh {
            return false;
        }
        self.reset(today);
        true
    }

    /// Unconditional reset, marking `today` as the current activity day.
    pub fn reset(&mut self, today: LocalDay) {
        self.calories = 0.0;
        self.day = Some(today);
    }

    /// Add consumed calories for `today`, rolling over first if needed.
    pub fn add(&mut self, calories: f64, today: LocalDay) {
        self.reset_if_stale(today);
        self.calories += calories;
        self.day = Some(today);
    }

    /// Percentage of `goal` consumed; zero when no goal is set.
    #[must_use]
    pub fn percent_of(&self, goal: f64) -> f64 {
        if goal > 0.0 {
            self.calories / goal * 100.0
        } else {
            0.0
        }
    }
}
