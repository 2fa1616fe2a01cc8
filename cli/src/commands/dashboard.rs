use anyhow::Result;
use chrono::Utc;
use tracing::info;

use weigh_core::clock::LOCAL_OFFSET;
use weigh_core::service::WeighService;
use weigh_core::session::{Dashboard, SessionState};
use weigh_core::streak::SignInOutcome;

use super::helpers::{bar, print_json};

pub(crate) fn cmd_dashboard(svc: &WeighService, user_id: &str, json: bool) -> Result<()> {
    let session = svc.start_session(user_id)?;
    let dashboard = session.dashboard()?;
    session.close();

    if json {
        return print_json(&dashboard);
    }
    print_dashboard(&dashboard);
    Ok(())
}

fn print_dashboard(d: &Dashboard) {
    let label = &d.date_label;
    println!("=== {label} ===\n");

    let progress = d.progress;
    let tdee = d.tdee;
    let percent = d.percent;
    let gauge = bar(percent, 30);
    println!("  Calories: {progress:.0} / {tdee:.0} kcal");
    println!("  {gauge} {percent:.0}%");

    let m = d.macros;
    println!(
        "  Protein {} | Fats {} | Carbs {} (kcal)",
        m.protein, m.fats, m.carbs
    );

    let streak = d.streak;
    let longest = d.longest_run;
    println!("\n  Streak: {streak} day(s), longest {longest}");
    if d.can_sign_in {
        println!("  You have not signed in today. Run `weigh sign-in`.");
    } else {
        println!("  Signed in today.");
    }
    if let Some(last) = d.login_dates.last() {
        println!("  Last sign-in day: {last}");
    }
}

pub(crate) fn cmd_sign_in(svc: &WeighService, user_id: &str, json: bool) -> Result<()> {
    let session = svc.start_session(user_id)?;
    let outcome = session.sign_in()?;
    session.close();

    if json {
        return print_json(&outcome);
    }
    match outcome {
        SignInOutcome::AlreadySignedIn { streak } => {
            println!("Already signed in today. Streak: {streak} day(s)");
        }
        SignInOutcome::SignedIn { streak, extended } => {
            if extended {
                println!("Signed in. Streak extended to {streak} day(s)!");
            } else {
                println!("Signed in. Streak: {streak} day(s)");
            }
        }
    }
    Ok(())
}

/// Follow the session until Ctrl-C, printing every state change.
pub(crate) async fn cmd_watch(svc: &WeighService, user_id: &str, json: bool) -> Result<()> {
    let session = svc.start_session(user_id)?;
    // Other `weigh` processes write through their own connections.
    let external = svc.follow_external_writes();
    let mut rx = session.subscribe_state();
    print_state(&rx.borrow_and_update(), json)?;
    eprintln!("Watching for changes. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    external.abort();
    session.close();
    Ok(())
}

fn print_state(state: &SessionState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
        return Ok(());
    }
    let progress = state.progress;
    let tdee = state.tdee;
    let streak = state.streak;
    let sign_in = if state.can_sign_in { "open" } else { "done" };
    let day = state
        .progress_day
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    let at = Utc::now().with_timezone(&LOCAL_OFFSET).format("%H:%M:%S");
    println!("[{at}] {day}  {progress:.0}/{tdee:.0} kcal  streak {streak}  sign-in {sign_in}");
    Ok(())
}
