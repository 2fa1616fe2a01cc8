use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::clock::{LocalDay, local_day_bounds};
use crate::error::{Result, TrackerError};
use crate::models::{
    ChangeKind, DailyCalories, LoggedFoodEntry, MealItem, MealLogResult, NutritionProfile,
    ProfileChange, ResetResult, SignInResult, UserProfile, meal_total,
};
use crate::store::ProfileStore;
use crate::streak::SignInOutcome;

const CHANGE_FEED_CAPACITY: usize = 64;

const PROFILE_COLUMNS: &str = "id, username, email, age, height_cm, weight_kg, bmi, gender, bmr,
     activity_level, maintenance_tdee, goal, tdee, progress, progress_day, streak,
     last_sign_in, login_dates, created_at, updated_at, revision";

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TrackerError::StoreUnavailable(format!("corrupt timestamp '{s}': {e}")))
}

/// SQLite-backed profile store.
///
/// Writes made through this handle are published on its change feed as they
/// commit. Writes made by other connections to the same file (another `weigh`
/// process) reach the feed through [`Database::poll_external_changes`].
pub struct Database {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ProfileChange>,
    seen: Mutex<SeenWrites>,
}

/// What this handle has already published.
#[derive(Default)]
struct SeenWrites {
    data_version: i64,
    revisions: HashMap<String, u64>,
}

/// Raw profile columns, converted to typed values after the row is read.
struct ProfileRow {
    id: String,
    username: String,
    email: String,
    age: Option<i64>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    bmi: Option<f64>,
    gender: Option<String>,
    bmr: Option<f64>,
    activity_level: Option<String>,
    maintenance_tdee: Option<f64>,
    goal: Option<String>,
    tdee: Option<f64>,
    progress: f64,
    progress_day: Option<String>,
    streak: i64,
    last_sign_in: Option<String>,
    login_dates: String,
    created_at: String,
    updated_at: String,
    revision: i64,
}

impl ProfileRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            age: row.get(3)?,
            height_cm: row.get(4)?,
            weight_kg: row.get(5)?,
            bmi: row.get(6)?,
            gender: row.get(7)?,
            bmr: row.get(8)?,
            activity_level: row.get(9)?,
            maintenance_tdee: row.get(10)?,
            goal: row.get(11)?,
            tdee: row.get(12)?,
            progress: row.get(13)?,
            progress_day: row.get(14)?,
            streak: row.get(15)?,
            last_sign_in: row.get(16)?,
            login_dates: row.get(17)?,
            created_at: row.get(18)?,
            updated_at: row.get(19)?,
            revision: row.get(20)?,
        })
    }

    fn into_profile(self) -> Result<UserProfile> {
        let login_dates: BTreeSet<LocalDay> = serde_json::from_str(&self.login_dates)?;
        Ok(UserProfile {
            id: self.id,
            username: self.username,
            email: self.email,
            age: self.age.and_then(|a| u32::try_from(a).ok()),
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            bmi: self.bmi,
            gender: self.gender.as_deref().map(str::parse).transpose()?,
            bmr: self.bmr,
            activity_level: self.activity_level.as_deref().map(str::parse).transpose()?,
            maintenance_tdee: self.maintenance_tdee,
            goal: self.goal.as_deref().map(str::parse).transpose()?,
            tdee: self.tdee,
            progress: self.progress,
            progress_day: self.progress_day.as_deref().map(str::parse).transpose()?,
            streak: u32::try_from(self.streak).unwrap_or(0),
            last_sign_in: self.last_sign_in.as_deref().map(parse_timestamp).transpose()?,
            login_dates,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revision: u64::try_from(self.revision).unwrap_or(0),
        })
    }
}

fn fetch_profile(conn: &Connection, user_id: &str) -> Result<UserProfile> {
    let row = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![user_id],
            ProfileRow::from_row,
        )
        .optional()?;
    row.ok_or(TrackerError::NotAuthenticated)?.into_profile()
}

struct EntryRow {
    id: i64,
    uuid: String,
    user_id: String,
    food_id: i64,
    food_name: String,
    calories: f64,
    quantity: f64,
    created_at: String,
}

impl EntryRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            food_id: row.get(3)?,
            food_name: row.get(4)?,
            calories: row.get(5)?,
            quantity: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_entry(self) -> Result<LoggedFoodEntry> {
        Ok(LoggedFoodEntry {
            created_at: parse_timestamp(&self.created_at)?,
            subtotal: self.calories * self.quantity,
            id: self.id,
            uuid: self.uuid,
            user_id: self.user_id,
            food_id: self.food_id,
            food_name: self.food_name,
            calories: self.calories,
            quantity: self.quantity,
        })
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            TrackerError::StoreUnavailable(format!(
                "Failed to open database {}: {e}",
                path.display()
            ))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let db = Database {
            conn: Mutex::new(conn),
            changes,
            seen: Mutex::new(SeenWrites::default()),
        };
        db.migrate()?;
        db.mark_all_seen()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrackerError::StoreUnavailable("database lock poisoned".to_string()))
    }

    fn seen(&self) -> Result<MutexGuard<'_, SeenWrites>> {
        self.seen
            .lock()
            .map_err(|_| TrackerError::StoreUnavailable("change cursor poisoned".to_string()))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    salt TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY REFERENCES accounts(id),
                    username TEXT NOT NULL,
                    email TEXT NOT NULL,
                    age INTEGER,
                    height_cm REAL,
                    weight_kg REAL,
                    bmi REAL,
                    gender TEXT,
                    bmr REAL,
                    activity_level TEXT,
                    maintenance_tdee REAL,
                    goal TEXT,
                    tdee REAL,
                    progress REAL NOT NULL DEFAULT 0,
                    progress_day TEXT,
                    streak INTEGER NOT NULL DEFAULT 0,
                    last_sign_in TEXT,
                    login_dates TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    user_id TEXT NOT NULL REFERENCES profiles(id),
                    food_id INTEGER NOT NULL,
                    food_name TEXT NOT NULL,
                    calories REAL NOT NULL,
                    quantity REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_entries_user_created
                    ON food_entries(user_id, created_at);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "ALTER TABLE profiles ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;
                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    fn mark_all_seen(&self) -> Result<()> {
        let conn = self.conn()?;
        let data_version: i64 = conn.pragma_query_value(None, "data_version", |row| row.get(0))?;
        let mut stmt = conn.prepare("SELECT id, revision FROM profiles")?;
        let revisions = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .map(|row| row.map(|(id, rev)| (id, u64::try_from(rev).unwrap_or(0))))
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        *self.seen()? = SeenWrites {
            data_version,
            revisions,
        };
        Ok(())
    }

    fn publish(&self, user_id: &str, kind: ChangeKind, profile: &UserProfile) {
        if let Ok(mut seen) = self.seen() {
            seen.revisions.insert(user_id.to_string(), profile.revision);
        }
        let change = ProfileChange {
            user_id: user_id.to_string(),
            kind,
            fields: profile.tracked_fields(),
        };
        // Sending only fails when nobody is subscribed.
        if self.changes.send(change).is_err() {
            debug!(user_id, ?kind, "no change-feed subscribers");
        }
    }

    /// Publish profiles committed by other connections since the last call.
    /// Returns the number of changes published.
    pub fn poll_external_changes(&self) -> Result<usize> {
        let changed = {
            let conn = self.conn()?;
            let data_version: i64 =
                conn.pragma_query_value(None, "data_version", |row| row.get(0))?;
            let mut seen = self.seen()?;
            if data_version == seen.data_version {
                return Ok(0);
            }
            seen.data_version = data_version;

            let mut stmt = conn.prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles"))?;
            let rows = stmt
                .query_map([], ProfileRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut changed = Vec::new();
            for row in rows {
                let profile = row.into_profile()?;
                let newer = seen
                    .revisions
                    .get(&profile.id)
                    .is_none_or(|&rev| rev < profile.revision);
                if newer {
                    seen.revisions.insert(profile.id.clone(), profile.revision);
                    changed.push(profile);
                }
            }
            changed
        };

        for profile in &changed {
            debug!(user_id = %profile.id, revision = profile.revision, "external write");
            self.publish(&profile.id, ChangeKind::External, profile);
        }
        Ok(changed.len())
    }

    /// Poll for external writes every `period` until the database is dropped.
    pub fn follow_external_writes(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let db = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(db) = db.upgrade() else { break };
                if let Err(e) = db.poll_external_changes() {
                    warn!(error = %e, "polling for external writes failed");
                }
            }
        })
    }

    // --- Accounts ---

    pub fn register_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<UserProfile> {
        let email = email.trim().to_lowercase();
        let username = username.trim();
        if email.is_empty() || username.is_empty() || password.is_empty() {
            return Err(TrackerError::InvalidInput(
                "Please fill in all fields.".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(TrackerError::InvalidInput(format!(
                "Invalid email address: {email}"
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM accounts WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(TrackerError::AlreadyExists(format!("Account for {email}")));
        }

        let id = Uuid::new_v4().to_string();
        let salt = auth::generate_salt();
        let hash = auth::hash_password(password, &salt);
        let now = timestamp(now);
        tx.execute(
            "INSERT INTO accounts (id, email, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, email, hash, salt, now],
        )?;
        tx.execute(
            "INSERT INTO profiles (id, username, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, username, email, now],
        )?;
        let profile = fetch_profile(&tx, &id)?;
        tx.commit()?;
        info!(user_id = %id, "registered account");
        Ok(profile)
    }

    /// Resolve credentials to a user id.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        let conn = self.conn()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT id, password_hash, salt FROM accounts WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        match row {
            Some((id, hash, salt)) if auth::verify_password(password, &salt, &hash) => Ok(id),
            _ => Err(TrackerError::NotAuthenticated),
        }
    }

    // --- Profiles ---

    pub fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        let conn = self.conn()?;
        fetch_profile(&conn, user_id)
    }

    pub fn save_nutrition(
        &self,
        user_id: &str,
        nutrition: &NutritionProfile,
        now: DateTime<Utc>,
    ) -> Result<UserProfile> {
        let profile = {
            let conn = self.conn()?;
            let updated = conn.execute(
                "UPDATE profiles SET age = ?1, height_cm = ?2, weight_kg = ?3, bmi = ?4,
                     gender = ?5, bmr = ?6, activity_level = ?7, maintenance_tdee = ?8,
                     goal = ?9, tdee = ?10, updated_at = ?11, revision = revision + 1
                 WHERE id = ?12",
                params![
                    nutrition.age,
                    nutrition.height_cm,
                    nutrition.weight_kg,
                    nutrition.bmi,
                    nutrition.gender.map(|g| g.as_str()),
                    nutrition.bmr,
                    nutrition.activity_level.map(|a| a.as_str()),
                    nutrition.maintenance_tdee,
                    nutrition.goal.map(|g| g.as_str()),
                    nutrition.tdee,
                    timestamp(now),
                    user_id,
                ],
            )?;
            if updated == 0 {
                return Err(TrackerError::NotAuthenticated);
            }
            fetch_profile(&conn, user_id)?
        };
        self.publish(user_id, ChangeKind::Onboarding, &profile);
        Ok(profile)
    }

    // --- Food entries ---

    pub fn entries_for_day(&self, user_id: &str, day: LocalDay) -> Result<Vec<LoggedFoodEntry>> {
        let (start, end) = local_day_bounds(day);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, uuid, user_id, food_id, food_name, calories, quantity, created_at
             FROM food_entries
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3
             ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(
                params![user_id, timestamp(start), timestamp(end)],
                EntryRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Calories per local day, latest first. `days` limits the window ending at `today`.
    pub fn calorie_history(
        &self,
        user_id: &str,
        today: LocalDay,
        days: Option<u32>,
    ) -> Result<Vec<DailyCalories>> {
        let since = days.map(|n| {
            let mut first = today;
            for _ in 1..n.max(1) {
                first = first.pred();
            }
            timestamp(first.start_utc())
        });

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT calories, quantity, created_at FROM food_entries
             WHERE user_id = ?1 AND (?2 IS NULL OR created_at >= ?2)
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id, since], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut totals: Vec<(LocalDay, f64)> = Vec::new();
        for (calories, quantity, created_at) in rows {
            let day = LocalDay::of(parse_timestamp(&created_at)?);
            match totals.last_mut() {
                Some((last, sum)) if *last == day => *sum += calories * quantity,
                _ => totals.push((day, calories * quantity)),
            }
        }

        Ok(totals
            .into_iter()
            .map(|(date, sum)| DailyCalories {
                date,
                calories: sum.round() as i64,
            })
            .collect())
    }
}

impl ProfileStore for Database {
    fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.get_profile(user_id)
    }

    fn record_sign_in(&self, user_id: &str, now: DateTime<Utc>) -> Result<SignInResult> {
        let (outcome, profile) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = fetch_profile(&tx, user_id)?;
            let mut state = current.sign_in_state();
            let outcome = state.sign_in(now);
            if let SignInOutcome::AlreadySignedIn { .. } = outcome {
                return Ok(SignInResult {
                    outcome,
                    fields: current.tracked_fields(),
                });
            }

            tx.execute(
                "UPDATE profiles SET last_sign_in = ?1, streak = ?2, login_dates = ?3,
                     updated_at = ?1, revision = revision + 1
                 WHERE id = ?4",
                params![
                    timestamp(now),
                    state.streak,
                    serde_json::to_string(&state.login_dates)?,
                    user_id,
                ],
            )?;
            let profile = fetch_profile(&tx, user_id)?;
            tx.commit()?;
            (outcome, profile)
        };
        info!(user_id, streak = outcome.streak(), "signed in");
        self.publish(user_id, ChangeKind::SignIn, &profile);
        Ok(SignInResult {
            outcome,
            fields: profile.tracked_fields(),
        })
    }

    fn reset_progress_if_stale(&self, user_id: &str, today: LocalDay) -> Result<ResetResult> {
        let (reset, profile) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = fetch_profile(&tx, user_id)?;
            let mut progress = current.daily_progress();
            if !progress.reset_if_stale(today) {
                return Ok(ResetResult {
                    reset: false,
                    fields: current.tracked_fields(),
                });
            }
            tx.execute(
                "UPDATE profiles SET progress = 0, progress_day = ?1, revision = revision + 1
                 WHERE id = ?2",
                params![today.to_string(), user_id],
            )?;
            let profile = fetch_profile(&tx, user_id)?;
            tx.commit()?;
            (true, profile)
        };
        info!(user_id, %today, "progress reset for new day");
        self.publish(user_id, ChangeKind::ProgressReset, &profile);
        Ok(ResetResult {
            reset,
            fields: profile.tracked_fields(),
        })
    }

    fn log_meal(
        &self,
        user_id: &str,
        items: &[MealItem],
        now: DateTime<Utc>,
    ) -> Result<MealLogResult> {
        if items.is_empty() {
            return Err(TrackerError::InvalidInput("No foods selected".to_string()));
        }
        let today = LocalDay::of(now);
        let total = meal_total(items);

        let (result, profile) = {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = fetch_profile(&tx, user_id)?;

            let created_at = timestamp(now);
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let uuid = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO food_entries
                         (uuid, user_id, food_id, food_name, calories, quantity, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        uuid,
                        user_id,
                        item.food_id,
                        item.food_name,
                        item.calories,
                        item.quantity,
                        created_at,
                    ],
                )?;
                entries.push(LoggedFoodEntry {
                    id: tx.last_insert_rowid(),
                    uuid,
                    user_id: user_id.to_string(),
                    food_id: item.food_id,
                    food_name: item.food_name.clone(),
                    calories: item.calories,
                    quantity: item.quantity,
                    subtotal: item.subtotal(),
                    created_at: now,
                });
            }

            let mut progress = current.daily_progress();
            let rolled_over = progress.reset_if_stale(today);
            progress.add(total, today);
            tx.execute(
                "UPDATE profiles SET progress = ?1, progress_day = ?2, updated_at = ?3,
                     revision = revision + 1
                 WHERE id = ?4",
                params![progress.calories, today.to_string(), created_at, user_id],
            )?;
            let profile = fetch_profile(&tx, user_id)?;
            tx.commit()?;
            (
                MealLogResult {
                    entries,
                    total_calories: total,
                    progress: progress.calories,
                    rolled_over,
                    fields: profile.tracked_fields(),
                },
                profile,
            )
        };
        info!(user_id, total, progress = result.progress, "meal logged");
        self.publish(user_id, ChangeKind::MealLogged, &profile);
        Ok(result)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProfileChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::nutrition::{ActivityLevel, Gender};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn day(s: &str) -> LocalDay {
        s.parse().unwrap()
    }

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let profile = db
            .register_account(
                "Ana@Example.com",
                "ana",
                "secret",
                utc("2025-11-01T02:00:00Z"),
            )
            .unwrap();
        (db, profile.id)
    }

    fn item(id: i64, qty: f64) -> MealItem {
        MealItem::from_catalog(catalog::find(id).unwrap(), Some(qty)).unwrap()
    }

    #[test]
    fn test_register_and_authenticate() {
        let (db, id) = setup();
        let profile = db.get_profile(&id).unwrap();
        assert_eq!(profile.email, "ana@example.com");
        assert_eq!(profile.username, "ana");
        assert_eq!(profile.streak, 0);
        assert!(profile.tdee.is_none());
        assert!(profile.bmr.is_none());
        assert!(profile.login_dates.is_empty());

        assert_eq!(db.authenticate("ana@example.com", "secret").unwrap(), id);
        assert!(matches!(
            db.authenticate("ana@example.com", "wrong"),
            Err(TrackerError::NotAuthenticated)
        ));
        assert!(matches!(
            db.authenticate("bob@example.com", "secret"),
            Err(TrackerError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_register_duplicate_email() {
        let (db, _) = setup();
        let err = db
            .register_account("ana@example.com", "ana2", "x", Utc::now())
            .unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyExists(_)));
    }

    #[test]
    fn test_register_validates_fields() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.register_account("", "ana", "x", Utc::now()),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            db.register_account("not-an-email", "ana", "x", Utc::now()),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_profile_is_not_authenticated() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_profile("nobody"),
            Err(TrackerError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_save_nutrition_roundtrip() {
        let (db, id) = setup();
        let nutrition = NutritionProfile {
            age: Some(30),
            height_cm: Some(170.0),
            weight_kg: Some(70.0),
            bmi: Some(24.22),
            gender: Some(Gender::Male),
            bmr: Some(1617.5),
            activity_level: Some(ActivityLevel::Active),
            maintenance_tdee: Some(2507.13),
            goal: None,
            tdee: Some(2507.13),
        };
        let profile = db.save_nutrition(&id, &nutrition, Utc::now()).unwrap();
        assert_eq!(profile.nutrition(), nutrition);
    }

    #[test]
    fn test_record_sign_in_sequence() {
        let (db, id) = setup();

        let first = db.record_sign_in(&id, utc("2025-11-02T20:00:00Z")).unwrap().outcome;
        assert_eq!(first, SignInOutcome::SignedIn { streak: 1, extended: false });

        // Same local day (2025-11-03), later in the afternoon.
        let again = db.record_sign_in(&id, utc("2025-11-03T10:00:00Z")).unwrap().outcome;
        assert_eq!(again, SignInOutcome::AlreadySignedIn { streak: 1 });

        // Next local day.
        let next = db.record_sign_in(&id, utc("2025-11-03T17:00:00Z")).unwrap().outcome;
        assert_eq!(next, SignInOutcome::SignedIn { streak: 2, extended: true });

        let profile = db.get_profile(&id).unwrap();
        assert_eq!(profile.streak, 2);
        assert_eq!(profile.last_sign_in, Some(utc("2025-11-03T17:00:00Z")));
        assert_eq!(
            profile.login_dates,
            BTreeSet::from([day("2025-11-03"), day("2025-11-04")])
        );

        // Skip a day.
        let gap = db.record_sign_in(&id, utc("2025-11-06T01:00:00Z")).unwrap().outcome;
        assert_eq!(gap, SignInOutcome::SignedIn { streak: 1, extended: false });
        assert_eq!(db.get_profile(&id).unwrap().login_dates.len(), 3);
    }

    #[test]
    fn test_concurrent_sign_ins_mutate_once() {
        let (db, id) = setup();
        let db = std::sync::Arc::new(db);
        let now = utc("2025-11-03T03:00:00Z");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let id = id.clone();
                std::thread::spawn(move || db.record_sign_in(&id, now).unwrap().outcome)
            })
            .collect();
        let outcomes: Vec<SignInOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let signed_in = outcomes
            .iter()
            .filter(|o| matches!(o, SignInOutcome::SignedIn { .. }))
            .count();
        assert_eq!(signed_in, 1);
        assert_eq!(db.get_profile(&id).unwrap().streak, 1);
    }

    #[test]
    fn test_log_meal_accumulates_progress() {
        let (db, id) = setup();
        let now = utc("2025-11-03T02:00:00Z");
        let result = db.log_meal(&id, &[item(1, 1.0), item(7, 2.0)], now).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert!((result.total_calories - 430.0).abs() < f64::EPSILON);
        assert!((result.progress - 430.0).abs() < f64::EPSILON);
        assert!(!result.rolled_over);

        let later = utc("2025-11-03T09:00:00Z");
        let result = db.log_meal(&id, &[item(4, 1.0)], later).unwrap();
        assert!((result.progress - 530.0).abs() < f64::EPSILON);

        let profile = db.get_profile(&id).unwrap();
        assert!((profile.progress - 530.0).abs() < f64::EPSILON);
        assert_eq!(profile.progress_day, Some(day("2025-11-03")));
    }

    #[test]
    fn test_log_meal_rolls_over_on_new_day() {
        let (db, id) = setup();
        db.log_meal(&id, &[item(1, 4.0)], utc("2025-11-03T02:00:00Z"))
            .unwrap();
        let result = db
            .log_meal(&id, &[item(7, 1.0)], utc("2025-11-03T16:30:00Z"))
            .unwrap();
        assert!(result.rolled_over);
        assert!((result.progress - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_meal_rejects_empty() {
        let (db, id) = setup();
        assert!(matches!(
            db.log_meal(&id, &[], Utc::now()),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reset_progress_if_stale() {
        let (db, id) = setup();
        db.log_meal(&id, &[item(1, 1.0)], utc("2025-11-03T02:00:00Z"))
            .unwrap();

        let same_day = db.reset_progress_if_stale(&id, day("2025-11-03")).unwrap();
        assert!(!same_day.reset);
        assert!((same_day.fields.progress - 250.0).abs() < f64::EPSILON);

        let next_day = db.reset_progress_if_stale(&id, day("2025-11-04")).unwrap();
        assert!(next_day.reset);
        assert!(next_day.fields.progress.abs() < f64::EPSILON);
        assert_eq!(next_day.fields.progress_day, Some(day("2025-11-04")));

        let again = db.reset_progress_if_stale(&id, day("2025-11-04")).unwrap();
        assert!(!again.reset);
    }

    #[test]
    fn test_entries_for_local_day() {
        let (db, id) = setup();
        // 23:30 local on the 3rd, and 00:30 local on the 4th.
        db.log_meal(&id, &[item(2, 1.0)], utc("2025-11-03T15:30:00Z"))
            .unwrap();
        db.log_meal(&id, &[item(3, 1.0)], utc("2025-11-03T16:30:00Z"))
            .unwrap();

        let third = db.entries_for_day(&id, day("2025-11-03")).unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].food_id, 2);
        assert_eq!(third[0].created_at, utc("2025-11-03T15:30:00Z"));

        let fourth = db.entries_for_day(&id, day("2025-11-04")).unwrap();
        assert_eq!(fourth.len(), 1);
        assert_eq!(fourth[0].food_name, "Steamed Broccoli");
    }

    #[test]
    fn test_calorie_history_groups_by_local_day() {
        let (db, id) = setup();
        db.log_meal(&id, &[item(1, 1.0)], utc("2025-11-01T01:00:00Z"))
            .unwrap();
        db.log_meal(&id, &[item(7, 1.5)], utc("2025-11-01T05:00:00Z"))
            .unwrap();
        db.log_meal(&id, &[item(4, 1.0)], utc("2025-11-02T17:00:00Z"))
            .unwrap();

        let history = db.calorie_history(&id, day("2025-11-03"), None).unwrap();
        assert_eq!(
            history,
            vec![
                DailyCalories { date: day("2025-11-03"), calories: 100 },
                DailyCalories { date: day("2025-11-01"), calories: 385 },
            ]
        );

        let recent = db.calorie_history(&id, day("2025-11-03"), Some(2)).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_change_feed_carries_values() {
        let (db, id) = setup();
        let mut rx = db.subscribe();
        db.record_sign_in(&id, utc("2025-11-03T03:00:00Z")).unwrap();
        let change = rx.try_recv().unwrap();
        assert_eq!(change.user_id, id);
        assert_eq!(change.kind, ChangeKind::SignIn);
        assert_eq!(change.fields.streak, 1);
        assert_eq!(change.fields.last_sign_in, Some(utc("2025-11-03T03:00:00Z")));

        // A denied sign-in writes nothing and publishes nothing.
        db.record_sign_in(&id, utc("2025-11-03T04:00:00Z")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_every_write_bumps_revision() {
        let (db, id) = setup();
        let start = db.get_profile(&id).unwrap().revision;

        let signed = db.record_sign_in(&id, utc("2025-11-03T03:00:00Z")).unwrap();
        assert_eq!(signed.fields.revision, start + 1);

        // Denied: nothing written, the current revision comes back.
        let denied = db.record_sign_in(&id, utc("2025-11-03T04:00:00Z")).unwrap();
        assert_eq!(denied.fields.revision, start + 1);
        assert_eq!(denied.fields.streak, 1);

        let meal = db
            .log_meal(&id, &[item(7, 1.0)], utc("2025-11-03T05:00:00Z"))
            .unwrap();
        assert_eq!(meal.fields.revision, start + 2);
        assert!((meal.fields.progress - 90.0).abs() < f64::EPSILON);

        let reset = db.reset_progress_if_stale(&id, day("2025-11-04")).unwrap();
        assert_eq!(reset.fields.revision, start + 3);
        let unchanged = db.reset_progress_if_stale(&id, day("2025-11-04")).unwrap();
        assert_eq!(unchanged.fields.revision, start + 3);

        let nutrition = db.get_profile(&id).unwrap().nutrition();
        let saved = db.save_nutrition(&id, &nutrition, Utc::now()).unwrap();
        assert_eq!(saved.revision, start + 4);
    }

    #[test]
    fn test_poll_publishes_writes_from_other_connections() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("weigh.db");
        let watcher = Database::open(&path).unwrap();
        let id = watcher
            .register_account("w@example.com", "w", "pw", utc("2025-11-03T01:00:00Z"))
            .unwrap()
            .id;
        let writer = Database::open(&path).unwrap();
        let mut rx = watcher.subscribe();
        assert_eq!(watcher.poll_external_changes().unwrap(), 0);

        writer
            .log_meal(&id, &[item(7, 2.0)], utc("2025-11-03T02:00:00Z"))
            .unwrap();
        assert_eq!(watcher.poll_external_changes().unwrap(), 1);
        let change = rx.try_recv().unwrap();
        assert_eq!(change.user_id, id);
        assert_eq!(change.kind, ChangeKind::External);
        assert!((change.fields.progress - 180.0).abs() < f64::EPSILON);

        // Already published, and our own writes are not reported back.
        assert_eq!(watcher.poll_external_changes().unwrap(), 0);
        watcher
            .record_sign_in(&id, utc("2025-11-03T03:00:00Z"))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::SignIn);
        assert_eq!(watcher.poll_external_changes().unwrap(), 0);
        assert!(rx.try_recv().is_err());

        // A profile registered elsewhere shows up too.
        let other = writer
            .register_account("o@example.com", "o", "pw", utc("2025-11-03T04:00:00Z"))
            .unwrap()
            .id;
        assert_eq!(watcher.poll_external_changes().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap().user_id, other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_external_writes_stops_with_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("weigh.db");
        let watcher = Arc::new(Database::open(&path).unwrap());
        let id = watcher
            .register_account("w@example.com", "w", "pw", utc("2025-11-03T01:00:00Z"))
            .unwrap()
            .id;
        let mut rx = watcher.subscribe();
        let follower = watcher.follow_external_writes(Duration::from_millis(250));

        let writer = Database::open(&path).unwrap();
        writer
            .record_sign_in(&id, utc("2025-11-03T02:00:00Z"))
            .unwrap();
        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.kind, ChangeKind::External);
        assert_eq!(change.fields.streak, 1);

        drop(watcher);
        tokio::time::timeout(Duration::from_secs(5), follower)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_open_file_database() {
        let dir = std::env::temp_dir().join(format!("weigh-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("weigh.db");
        let id = {
            let db = Database::open(&path).unwrap();
            db.register_account("a@b.c", "a", "pw", Utc::now()).unwrap().id
        };
        let db = Database::open(&path).unwrap();
        assert_eq!(db.authenticate("a@b.c", "pw").unwrap(), id);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
