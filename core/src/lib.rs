pub mod auth;
pub mod catalog;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod nutrition;
pub mod progress;
pub mod service;
pub mod session;
pub mod store;
pub mod streak;

pub use error::{Result, TrackerError};
