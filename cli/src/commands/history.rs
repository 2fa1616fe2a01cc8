use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weigh_core::service::WeighService;

use super::helpers::{parse_day, print_json, truncate};

pub(crate) fn cmd_history(
    svc: &WeighService,
    user_id: &str,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let history = svc.history(user_id, days)?;

    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        eprintln!("No meals logged yet");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Day")]
        label: String,
        #[tabled(rename = "kcal")]
        calories: i64,
    }

    let rows: Vec<DayRow> = history
        .iter()
        .map(|d| DayRow {
            date: d.date.to_string(),
            label: d.date.long_format(),
            calories: d.calories,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_entries(
    svc: &WeighService,
    user_id: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let day = parse_day(date, svc.today())?;
    let entries = svc.entries_for_day(user_id, Some(day))?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        eprintln!("No entries for {day}");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "kcal")]
        subtotal: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            time: e
                .created_at
                .with_timezone(&weigh_core::clock::LOCAL_OFFSET)
                .format("%H:%M")
                .to_string(),
            name: truncate(&e.food_name, 35),
            quantity: format!("{}", e.quantity),
            subtotal: format!("{:.0}", e.subtotal),
        })
        .collect();
    let total: f64 = entries.iter().map(|e| e.subtotal).sum();

    println!("=== {} ===", day.long_format());
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("  TOTAL: {total:.0} kcal");
    Ok(())
}
