use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::LocalDay;

/// The sign-in fields of a profile. One sign-in per local day; the day right
/// after the previous sign-in extends the streak, a longer gap restarts at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInState {
    pub last_sign_in: Option<DateTime<Utc>>,
    pub streak: u32,
    pub login_dates: BTreeSet<LocalDay>,
}

/// What a sign-in attempt at a given instant would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInDecision {
    AlreadySignedIn,
    Permitted { streak: u32, day: LocalDay },
}

impl SignInDecision {
    #[must_use]
    pub fn is_permitted(self) -> bool {
        matches!(self, Self::Permitted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignInOutcome {
    AlreadySignedIn { streak: u32 },
    SignedIn { streak: u32, extended: bool },
}

impl SignInOutcome {
    #[must_use]
    pub fn streak(self) -> u32 {
        match self {
            Self::AlreadySignedIn { streak } | Self::SignedIn { streak, .. } => streak,
        }
    }
}

/// Whether a sign-in is still open today.
#[must_use]
pub fn can_sign_in(last_sign_in: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_sign_in.is_none_or(|last| LocalDay::of(last) != LocalDay::of(now))
}

/// Decide a sign-in against the previous sign-in and the current streak.
#[must_use]
pub fn evaluate(
    last_sign_in: Option<DateTime<Utc>>,
    streak: u32,
    now: DateTime<Utc>,
) -> SignInDecision {
    let today = LocalDay::of(now);
    let Some(last) = last_sign_in.map(LocalDay::of) else {
        return SignInDecision::Permitted { streak: 1, day: today };
    };

    if last == today {
        return SignInDecision::AlreadySignedIn;
    }

    let streak = if last.is_day_before(today) {
        streak.saturating_add(1)
    } else {
        1
    };
    SignInDecision::Permitted { streak, day: today }
}

impl SignInState {
    #[must_use]
    pub fn can_sign_in(&self, now: DateTime<Utc>) -> bool {
        can_sign_in(self.last_sign_in, now)
    }

    #[must_use]
    pub fn decide(&self, now: DateTime<Utc>) -> SignInDecision {
        evaluate(self.last_sign_in, self.streak, now)
    }

    /// Apply a sign-in at `now`. A second call on the same local day is a no-op.
    pub fn sign_in(&mut self, now: DateTime<Utc>) -> SignInOutcome {
        match self.decide(now) {
            SignInDecision::AlreadySignedIn => SignInOutcome::AlreadySignedIn {
                streak: self.streak,
            },
            SignInDecision::Permitted { streak, day } => {
                let extended = streak > 1;
                self.streak = streak;
                self.login_dates.insert(day);
                self.last_sign_in = Some(now);
                SignInOutcome::SignedIn { streak, extended }
            }
        }
    }

    /// Longest run of consecutive days found in the login history.
    #[must_use]
    pub fn longest_run(&self) -> u32 {
        longest_run(&self.login_dates)
    }
}

#[must_use]
pub fn longest_run(days: &BTreeSet<LocalDay>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<LocalDay> = None;
    for &day in days {
        run = match prev {
            Some(p) if p.is_day_before(day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn day(s: &str) -> LocalDay {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_sign_in_starts_streak_at_one() {
        let mut state = SignInState::default();
        let outcome = state.sign_in(utc("2025-11-03T01:00:00Z"));
        assert_eq!(outcome, SignInOutcome::SignedIn { streak: 1, extended: false });
        assert_eq!(state.streak, 1);
        assert!(state.login_dates.contains(&day("2025-11-03")));
    }

    #[test]
    fn test_same_local_day_is_denied() {
        // 04:00 and 18:00 local on 2025-11-03
        let last = utc("2025-11-02T20:00:00Z");
        let now = utc("2025-11-03T10:00:00Z");
        assert!(!can_sign_in(Some(last), now));
        assert_eq!(evaluate(Some(last), 4, now), SignInDecision::AlreadySignedIn);

        let mut state = SignInState {
            last_sign_in: Some(last),
            streak: 4,
            login_dates: BTreeSet::from([day("2025-11-03")]),
        };
        let before = state.clone();
        assert_eq!(state.sign_in(now), SignInOutcome::AlreadySignedIn { streak: 4 });
        assert_eq!(state, before);
    }

    #[test]
    fn test_next_local_day_extends() {
        let last = utc("2025-11-02T20:00:00Z"); // 2025-11-03 local
        let now = utc("2025-11-03T17:00:00Z"); // 2025-11-04 local
        assert!(can_sign_in(Some(last), now));
        assert_eq!(
            evaluate(Some(last), 4, now),
            SignInDecision::Permitted { streak: 5, day: day("2025-11-04") }
        );
    }

    #[test]
    fn test_gap_resets_to_one() {
        let last = utc("2025-11-02T20:00:00Z"); // 2025-11-03 local
        for now in ["2025-11-04T16:00:00Z", "2025-11-20T03:00:00Z"] {
            let SignInDecision::Permitted { streak, .. } = evaluate(Some(last), 9, utc(now)) else {
                panic!("expected permitted at {now}");
            };
            assert_eq!(streak, 1);
        }
    }

    #[test]
    fn test_same_utc_day_different_local_day_extends() {
        // 15:00Z and 17:00Z on the same UTC date straddle local midnight.
        let last = utc("2025-11-03T15:00:00Z");
        let now = utc("2025-11-03T17:00:00Z");
        assert_eq!(
            evaluate(Some(last), 2, now),
            SignInDecision::Permitted { streak: 3, day: day("2025-11-04") }
        );
    }

    #[test]
    fn test_sign_in_twice_with_same_now_is_idempotent() {
        let now = utc("2025-11-03T10:00:00Z");
        let mut state = SignInState {
            last_sign_in: Some(utc("2025-11-02T10:00:00Z")),
            streak: 2,
            login_dates: BTreeSet::from([day("2025-11-02")]),
        };
        assert_eq!(state.sign_in(now), SignInOutcome::SignedIn { streak: 3, extended: true });
        let after_first = state.clone();
        assert_eq!(state.sign_in(now), SignInOutcome::AlreadySignedIn { streak: 3 });
        assert_eq!(state, after_first);
        assert_eq!(state.login_dates.len(), 2);
    }

    #[test]
    fn test_login_dates_are_a_set() {
        let mut state = SignInState {
            last_sign_in: Some(utc("2025-11-01T10:00:00Z")),
            streak: 1,
            login_dates: BTreeSet::from([day("2025-11-02")]),
        };
        // A stale last_sign_in lets today's date through even though it is already recorded.
        state.sign_in(utc("2025-11-02T10:00:00Z"));
        assert_eq!(state.login_dates.len(), 1);
    }

    #[test]
    fn test_longest_run() {
        let days: BTreeSet<LocalDay> = [
            "2025-10-30",
            "2025-10-31",
            "2025-11-01",
            "2025-11-03",
            "2025-11-04",
        ]
        .into_iter()
        .map(day)
        .collect();
        assert_eq!(longest_run(&days), 3);
        assert_eq!(longest_run(&BTreeSet::new()), 0);
        assert_eq!(longest_run(&BTreeSet::from([day("2025-11-03")])), 1);
    }
}
