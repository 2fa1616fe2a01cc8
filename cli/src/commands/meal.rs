use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weigh_core::catalog::CatalogFood;
use weigh_core::models::MealLogResult;
use weigh_core::service::WeighService;

use super::helpers::{parse_pick, print_json, truncate};

pub(crate) fn cmd_foods(svc: &WeighService, query: Option<&str>, json: bool) -> Result<()> {
    let foods = svc.catalog(query);

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            let query = query.unwrap_or_default();
            eprintln!("No foods found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        return print_json(&foods);
    }
    print_food_table(&foods);
    Ok(())
}

fn print_food_table(foods: &[&CatalogFood]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        calories: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(f.name, 35),
            calories: format!("{:.0}", f.calories),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_meal(svc: &WeighService, user_id: &str, picks: &[String], json: bool) -> Result<()> {
    if picks.is_empty() {
        bail!("No foods selected. Pass food ids, e.g. `weigh meal 1 7x2` (see `weigh foods`)");
    }
    let picks = picks
        .iter()
        .map(|p| parse_pick(p))
        .collect::<Result<Vec<_>>>()?;
    let (result, tdee) = log_picks(svc, user_id, &picks)?;

    if json {
        return print_json(&result);
    }

    if result.rolled_over {
        println!("New day: yesterday's progress was reset.");
    }
    for e in &result.entries {
        let name = &e.food_name;
        let qty = e.quantity;
        let subtotal = e.subtotal;
        println!("  {name} x{qty} = {subtotal:.0} kcal");
    }
    let total = result.total_calories;
    let progress = result.progress;
    println!("Logged {total:.0} kcal. Today: {progress:.0} / {tdee:.0} kcal");
    Ok(())
}

/// Log the picks and return the result with the current calorie goal.
fn log_picks(
    svc: &WeighService,
    user_id: &str,
    picks: &[(i64, Option<f64>)],
) -> Result<(MealLogResult, f64)> {
    let items = svc.build_meal(picks)?;
    let session = svc.start_session(user_id)?;
    let mut result = session.log_meal(&items)?;
    // Starting the session already reset a stale day before the meal landed.
    result.rolled_over |= session.rolled_over_at_start();
    let tdee = session.state().tdee;
    session.close();
    Ok((result, tdee))
}
