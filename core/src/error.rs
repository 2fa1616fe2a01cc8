/// Failure kinds surfaced by the tracker.
///
/// The day/streak/progress logic itself never fails; every variant here comes
/// from the profile store boundary or from validating user input.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Profile store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl TrackerError {
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StoreUnavailable(format!("corrupt record: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
