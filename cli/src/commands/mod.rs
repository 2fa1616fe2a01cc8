mod account;
mod dashboard;
mod helpers;
mod history;
mod meal;
mod onboarding;

pub(crate) use account::{cmd_login, cmd_logout, cmd_profile, cmd_register};
pub(crate) use dashboard::{cmd_dashboard, cmd_sign_in, cmd_watch};
pub(crate) use history::{cmd_entries, cmd_history};
pub(crate) use meal::{cmd_foods, cmd_meal};
pub(crate) use onboarding::{cmd_activity, cmd_gender, cmd_recommend, cmd_survey};
