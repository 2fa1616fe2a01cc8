use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weigh_core::nutrition::{ActivityLevel, Biometrics, Gender, Goal};
use weigh_core::service::WeighService;

use super::helpers::{print_json, require_positive};

pub(crate) fn cmd_survey(
    svc: &WeighService,
    user_id: &str,
    age: u32,
    height_cm: f64,
    weight_kg: f64,
    json: bool,
) -> Result<()> {
    let body = Biometrics {
        age,
        height_cm: require_positive("Height", height_cm)?,
        weight_kg: require_positive("Weight", weight_kg)?,
    };
    let profile = svc.submit_survey(user_id, body)?;

    if json {
        return print_json(&profile);
    }
    let bmi = profile.bmi.unwrap_or_default();
    println!("BMI: {bmi:.2}");
    if profile.gender.is_none() {
        println!("Next: weigh gender <male|female>");
    }
    Ok(())
}

pub(crate) fn cmd_gender(svc: &WeighService, user_id: &str, gender: &str, json: bool) -> Result<()> {
    let gender: Gender = gender.parse()?;
    let profile = svc.select_gender(user_id, gender)?;

    if json {
        return print_json(&profile);
    }
    let bmr = profile.bmr.unwrap_or_default();
    println!("BMR: {bmr:.2} kcal/day");
    if profile.activity_level.is_none() {
        println!("Next: weigh activity <level>   (run `weigh activity` to list levels)");
    }
    Ok(())
}

pub(crate) fn cmd_activity(
    svc: &WeighService,
    user_id: &str,
    level: Option<&str>,
    json: bool,
) -> Result<()> {
    let Some(level) = level else {
        return print_levels(json);
    };
    let level: ActivityLevel = level.parse()?;
    let profile = svc.select_activity(user_id, level)?;

    if json {
        return print_json(&profile);
    }
    let tdee = profile.maintenance_tdee.unwrap_or_default();
    println!("Maintenance TDEE: {tdee:.2} kcal/day");
    println!("Next: weigh recommend");
    Ok(())
}

fn print_levels(json: bool) -> Result<()> {
    #[derive(Tabled, serde::Serialize)]
    struct LevelRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Level")]
        level: &'static str,
        #[tabled(rename = "Multiplier")]
        multiplier: f64,
        #[tabled(rename = "Typical")]
        description: &'static str,
    }

    let rows: Vec<LevelRow> = ActivityLevel::ALL
        .iter()
        .enumerate()
        .map(|(i, l)| LevelRow {
            idx: i + 1,
            level: l.as_str(),
            multiplier: l.multiplier(),
            description: l.description(),
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_recommend(
    svc: &WeighService,
    user_id: &str,
    choose: Option<&str>,
    json: bool,
) -> Result<()> {
    if let Some(goal) = choose {
        let goal: Goal = goal.parse()?;
        let profile = svc.choose_goal(user_id, goal)?;
        if json {
            return print_json(&profile);
        }
        let tdee = profile.tdee.unwrap_or_default();
        let label = goal.label();
        println!("Goal set: {label}. Daily calorie goal: {tdee:.0} kcal");
        return Ok(());
    }

    let rec = svc.recommendation(user_id)?;
    if json {
        return print_json(&rec);
    }

    #[derive(Tabled)]
    struct GoalRow {
        #[tabled(rename = "Goal")]
        goal: &'static str,
        #[tabled(rename = "Option")]
        label: &'static str,
        #[tabled(rename = "kcal/day")]
        tdee: String,
        #[tabled(rename = "")]
        marker: &'static str,
    }

    let rows: Vec<GoalRow> = rec
        .options
        .iter()
        .map(|o| GoalRow {
            goal: o.goal.as_str(),
            label: o.label,
            tdee: format!("{:.0}", o.tdee),
            marker: if o.goal == rec.recommended {
                "recommended"
            } else {
                ""
            },
        })
        .collect();

    let bmi = rec.bmi;
    let category = rec.category;
    println!("BMI {bmi:.2}: {category}");
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Choose with: weigh recommend --choose <lose|maintain|gain>");
    Ok(())
}
