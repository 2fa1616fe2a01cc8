use anyhow::Result;
use serde_json::json;

use weigh_core::models::UserProfile;
use weigh_core::service::WeighService;

use super::helpers::{password_or_prompt, print_json};
use crate::config::Config;

pub(crate) fn cmd_register(
    svc: &WeighService,
    config: &Config,
    email: &str,
    username: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let profile = svc.register(email, username, &password)?;
    config.save_session(&profile.id)?;

    if json {
        return print_json(&profile);
    }
    let name = &profile.username;
    println!("Welcome, {name}! You are now logged in.");
    println!("Next: weigh survey --age <years> --height <cm> --weight <kg>");
    Ok(())
}

pub(crate) fn cmd_login(
    svc: &WeighService,
    config: &Config,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let user_id = svc.login(email, &password)?;
    config.save_session(&user_id)?;
    let profile = svc.profile(&user_id)?;

    if json {
        return print_json(&profile);
    }
    let name = &profile.username;
    println!("Logged in as {name}");
    if profile.tdee.is_none() {
        println!("Your profile is incomplete. Continue with `weigh survey`.");
    }
    Ok(())
}

pub(crate) fn cmd_logout(config: &Config, json: bool) -> Result<()> {
    let was_logged_in = config.clear_session()?;
    if json {
        return print_json(&json!({ "logged_out": was_logged_in }));
    }
    if was_logged_in {
        println!("Logged out");
    } else {
        eprintln!("Not logged in");
    }
    Ok(())
}

pub(crate) fn cmd_profile(svc: &WeighService, user_id: &str, json: bool) -> Result<()> {
    let profile = svc.profile(user_id)?;
    if json {
        return print_json(&profile);
    }
    print_profile(&profile);
    Ok(())
}

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_profile(p: &UserProfile) {
    println!("{} <{}>", p.username, p.email);
    println!("  Age:            {}", show(p.age));
    println!("  Height (cm):    {}", show(p.height_cm));
    println!("  Weight (kg):    {}", show(p.weight_kg));
    println!("  BMI:            {}", show(p.bmi));
    println!("  Gender:         {}", show(p.gender));
    println!("  BMR:            {}", show(p.bmr));
    println!("  Activity:       {}", show(p.activity_level));
    println!("  Maintenance:    {}", show(p.maintenance_tdee));
    println!("  Goal:           {}", show(p.goal.map(|g| g.label())));
    println!("  Daily calories: {}", show(p.tdee));
    println!("  Streak:         {}", p.streak);
}
