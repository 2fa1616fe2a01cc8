use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};

use weigh_core::clock::LocalDay;

/// Read one line from stdin after printing `label` to stderr.
pub(crate) fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim().to_string())
}

pub(crate) fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt_line("Password"),
    }
}

/// Parse a meal pick: `ID` or `IDxQTY` (e.g. `7`, `7x2`, `1x0.5`).
pub(crate) fn parse_pick(s: &str) -> Result<(i64, Option<f64>)> {
    let s = s.trim();
    let (id, qty) = match s.split_once(['x', 'X', '*']) {
        Some((id, qty)) => (id, Some(qty)),
        None => (s, None),
    };
    let id: i64 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid food id in '{s}'. Use ID or IDxQTY, e.g. 7x2"))?;
    let qty = match qty {
        Some(q) => {
            let q: f64 = q
                .trim()
                .parse()
                .with_context(|| format!("Invalid quantity in '{s}'"))?;
            Some(q)
        }
        None => None,
    };
    Ok((id, qty))
}

pub(crate) fn parse_day(s: Option<&str>, today: LocalDay) -> Result<LocalDay> {
    match s {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today.pred()),
        Some(s) => s
            .parse()
            .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")),
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let t: String = s.chars().take(max - 1).collect();
        format!("{t}…")
    }
}

/// A text progress bar, `width` cells wide.
pub(crate) fn bar(percent: f64, width: usize) -> String {
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pick() {
        assert_eq!(parse_pick("7").unwrap(), (7, None));
        assert_eq!(parse_pick("7x2").unwrap(), (7, Some(2.0)));
        assert_eq!(parse_pick(" 1X0.5 ").unwrap(), (1, Some(0.5)));
        assert_eq!(parse_pick("3*4").unwrap(), (3, Some(4.0)));
        assert!(parse_pick("banana").is_err());
        assert!(parse_pick("7xmany").is_err());
    }

    #[test]
    fn test_parse_day() {
        let today: LocalDay = "2025-11-03".parse().unwrap();
        assert_eq!(parse_day(None, today).unwrap(), today);
        assert_eq!(
            parse_day(Some("yesterday"), today).unwrap().to_string(),
            "2025-11-02"
        );
        assert_eq!(
            parse_day(Some("2025-01-31"), today).unwrap().to_string(),
            "2025-01-31"
        );
        assert!(parse_day(Some("31/01/2025"), today).is_err());
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive("Height", 170.0).is_ok());
        assert!(require_positive("Height", 0.0).is_err());
        assert!(require_positive("Height", f64::NAN).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Grilled Chicken Breast", 10), "Grilled C…");
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(50.0, 10), "[#####-----]");
        assert_eq!(bar(150.0, 4), "[####]");
        assert_eq!(bar(0.0, 4), "[----]");
    }
}
