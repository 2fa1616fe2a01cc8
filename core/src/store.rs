use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::clock::LocalDay;
use crate::error::Result;
use crate::models::{
    MealItem, MealLogResult, ProfileChange, ResetResult, SignInResult, UserProfile,
};

/// The profile store a tracking session reads and writes through.
///
/// Implementations must make `record_sign_in`, `reset_progress_if_stale` and
/// `log_meal` atomic per profile, and publish every committed write on the
/// change feed returned by `subscribe`. Each write bumps the profile's
/// revision, and the fields returned from a write carry the revision it
/// committed.
pub trait ProfileStore: Send + Sync {
    fn profile(&self, user_id: &str) -> Result<UserProfile>;

    fn record_sign_in(&self, user_id: &str, now: DateTime<Utc>) -> Result<SignInResult>;

    fn reset_progress_if_stale(&self, user_id: &str, today: LocalDay) -> Result<ResetResult>;

    fn log_meal(&self, user_id: &str, items: &[MealItem], now: DateTime<Utc>)
    -> Result<MealLogResult>;

    fn subscribe(&self) -> broadcast::Receiver<ProfileChange>;
}
