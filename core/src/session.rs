use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{Clock, LocalDay, until_next_midnight};
use crate::error::Result;
use crate::models::{MealItem, MealLogResult, ProfileChange, TrackedFields};
use crate::nutrition::MacroBreakdown;
use crate::progress::{DayState, Progress, day_state};
use crate::store::ProfileStore;
use crate::streak::{self, SignInOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub tdee: f64,
    pub progress: f64,
    pub progress_day: Option<LocalDay>,
    pub streak: u32,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub login_dates: BTreeSet<LocalDay>,
    pub can_sign_in: bool,
    pub day_state: DayState,
    /// Revision of the profile snapshot these values came from.
    pub revision: u64,
}

impl SessionState {
    fn from_fields(fields: TrackedFields, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            tdee: fields.tdee,
            progress: fields.progress,
            progress_day: fields.progress_day,
            streak: fields.streak,
            last_sign_in: fields.last_sign_in,
            login_dates: fields.login_dates,
            can_sign_in: false,
            day_state: DayState::Fresh,
            revision: fields.revision,
        };
        state.recompute(now);
        state
    }

    /// Overwrite with values from the store unless newer ones are already
    /// applied. Returns whether the values were taken.
    fn apply(&mut self, fields: TrackedFields, now: DateTime<Utc>) -> bool {
        if fields.revision < self.revision {
            self.recompute(now);
            return false;
        }
        *self = Self::from_fields(fields, now);
        true
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        self.can_sign_in = streak::can_sign_in(self.last_sign_in, now);
        self.day_state = day_state(self.progress_day, self.progress, LocalDay::of(now));
    }
}

/// Everything the dashboard screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub date: LocalDay,
    pub date_label: String,
    pub tdee: f64,
    pub progress: f64,
    pub percent: f64,
    pub macros: MacroBreakdown,
    pub streak: u32,
    pub longest_run: u32,
    pub can_sign_in: bool,
    pub login_dates: Vec<LocalDay>,
}

/// Shared by the session handle and its background tasks.
struct Shared {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    user_id: String,
    state: watch::Sender<SessionState>,
}

impl Shared {
    fn apply(&self, fields: TrackedFields) {
        let now = self.clock.now();
        self.state.send_modify(|s| {
            let revision = fields.revision;
            if !s.apply(fields, now) {
                debug!(revision, current = s.revision, "skipped stale profile values");
            }
        });
    }

    fn recompute(&self) {
        let now = self.clock.now();
        self.state.send_modify(|s| s.recompute(now));
    }

    fn reset_if_stale(&self) -> Result<bool> {
        let today = self.clock.today();
        let result = self
            .store
            .reset_progress_if_stale(&self.user_id, today)
            .inspect_err(|e| {
                warn!(user_id = %self.user_id, error = %e, "progress reset failed");
            })?;
        self.apply(result.fields);
        Ok(result.reset)
    }

    fn resync(&self) {
        match self.store.profile(&self.user_id) {
            Ok(profile) => self.apply(profile.tracked_fields()),
            Err(e) => warn!(user_id = %self.user_id, error = %e, "snapshot read failed"),
        }
    }
}

/// A signed-in tracking session.
///
/// Mirrors the tracked profile fields in a `watch` channel. One background
/// task sleeps until each local midnight to reset stale progress, another
/// follows the store's change feed. Both stop when the session is dropped.
pub struct Session {
    shared: Arc<Shared>,
    rolled_over_at_start: bool,
    midnight: JoinHandle<()>,
    feed: JoinHandle<()>,
}

impl Session {
    /// Load the profile, reset stale progress and start the background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        store: Arc<dyn ProfileStore>,
        user_id: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // Subscribe before the first read so no write slips between them.
        let changes = store.subscribe();
        let profile = store.profile(user_id)?;
        let (state, _) = watch::channel(SessionState::from_fields(
            profile.tracked_fields(),
            clock.now(),
        ));
        let shared = Arc::new(Shared {
            store,
            clock,
            user_id: profile.id,
            state,
        });

        // A failed reset is logged and leaves the loaded state in place.
        let rolled_over_at_start = shared.reset_if_stale().unwrap_or(false);

        let first_midnight = Instant::now() + until_next_midnight(shared.clock.now());
        let midnight = tokio::spawn(midnight_loop(shared.clone(), first_midnight));
        let feed = tokio::spawn(follow_changes(shared.clone(), changes));
        info!(user_id = %shared.user_id, "session started");

        Ok(Self {
            shared,
            rolled_over_at_start,
            midnight,
            feed,
        })
    }

    /// Whether starting the session reset progress left from an earlier day.
    #[must_use]
    pub fn rolled_over_at_start(&self) -> bool {
        self.rolled_over_at_start
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.shared.user_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn sign_in(&self) -> Result<SignInOutcome> {
        let shared = &self.shared;
        let now = shared.clock.now();
        let result = shared
            .store
            .record_sign_in(&shared.user_id, now)
            .inspect_err(|e| {
                warn!(user_id = %shared.user_id, error = %e, "sign-in failed");
            })?;
        shared.apply(result.fields);
        Ok(result.outcome)
    }

    pub fn log_meal(&self, items: &[MealItem]) -> Result<MealLogResult> {
        let shared = &self.shared;
        let now = shared.clock.now();
        let result = shared
            .store
            .log_meal(&shared.user_id, items, now)
            .inspect_err(|e| {
                warn!(user_id = %shared.user_id, error = %e, "meal logging failed");
            })?;
        shared.apply(result.fields.clone());
        Ok(result)
    }

    /// Opportunistic reset. Returns true when the day had rolled over.
    pub fn refresh(&self) -> Result<bool> {
        self.shared.reset_if_stale()
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        self.refresh()?;
        let today = self.shared.clock.today();
        let state = self.state();
        let progress = Progress::new(state.progress, state.progress_day);
        Ok(Dashboard {
            date: today,
            date_label: today.long_format(),
            tdee: state.tdee,
            progress: state.progress,
            percent: progress.percent_of(state.tdee),
            macros: MacroBreakdown::of(state.progress, state.tdee),
            streak: state.streak,
            longest_run: streak::longest_run(&state.login_dates),
            can_sign_in: state.can_sign_in,
            login_dates: state.login_dates.iter().copied().collect(),
        })
    }

    /// Stop the background tasks. Dropping the session does the same.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.midnight.abort();
        self.feed.abort();
        debug!(user_id = %self.shared.user_id, "session closed");
    }
}

async fn midnight_loop(shared: Arc<Shared>, mut deadline: Instant) {
    loop {
        tokio::time::sleep_until(deadline).await;

        // Failures are logged by the reset itself; the next midnight tries again.
        if let Ok(true) = shared.reset_if_stale() {
            info!(user_id = %shared.user_id, "day rolled over");
        }
        shared.recompute();

        let wait = until_next_midnight(shared.clock.now());
        debug!(seconds = wait.as_secs(), "sleeping until local midnight");
        deadline = Instant::now() + wait;
    }
}

async fn follow_changes(shared: Arc<Shared>, mut changes: broadcast::Receiver<ProfileChange>) {
    loop {
        match changes.recv().await {
            Ok(change) if change.user_id == shared.user_id => {
                debug!(kind = ?change.kind, "applying profile change");
                shared.apply(change.fields);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "change feed lagged, re-reading profile");
                shared.resync();
            }
            Err(RecvError::Closed) => break,
        }
    }
}
