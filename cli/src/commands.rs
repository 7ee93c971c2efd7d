//! Rendering for CLI subcommands.

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use voyage_common::{Booking, CurrencyOption, Money};
use voyage_fx::{Conversion, ConversionStatus, RateSnapshot, RateStore, RevenueReport};

pub fn load_bookings(path: &Path) -> anyhow::Result<Vec<Booking>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid bookings in {}", path.display()))
}

/// Rate table with store status.
pub fn rates(store: &RateStore, json: bool) -> anyhow::Result<String> {
    let snapshot = store.snapshot();
    let status = store.status();

    if json {
        let value = serde_json::json!({ "status": status, "snapshot": &*snapshot });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut out = String::new();
    let as_of = status
        .refreshed_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "built-in fallback".to_string());
    writeln!(out, "Rates per 1 {} ({})", snapshot.base(), as_of)?;
    if status.last_refresh_failed {
        writeln!(out, "warning: last refresh failed, rates may be out of date")?;
    }
    for (code, rate) in snapshot.iter() {
        writeln!(out, "  {:<4} {:>14.4}", code, rate)?;
    }
    Ok(out.trim_end().to_string())
}

pub fn conversion(conversion: &Conversion, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(conversion)?);
    }

    let line = format!("{} = {}", conversion.input, conversion.output.round());
    let note = match &conversion.status {
        ConversionStatus::Converted => None,
        ConversionStatus::Stale => Some("rates may be out of date".to_string()),
        ConversionStatus::Unchanged => None,
        ConversionStatus::UnknownCurrency(code) => {
            Some(format!("no rate for {}, amount not converted", code))
        }
    };

    Ok(match note {
        Some(note) => format!("{} ({})", line, note),
        None => line,
    })
}

pub fn revenue(report: &RevenueReport, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut out = String::new();
    writeln!(
        out,
        "Revenue: {} ({} bookings counted, {} skipped)",
        report.total.round(),
        report.counted,
        report.skipped
    )?;
    if !report.unconverted.is_empty() {
        writeln!(
            out,
            "warning: amounts not converted for {}",
            report.unconverted.join(", ")
        )?;
    }
    if report.stale {
        writeln!(out, "warning: rates may be out of date")?;
    }
    Ok(out.trim_end().to_string())
}

/// Catalog entries with the current value of one base unit in each.
pub fn currencies(
    options: &[CurrencyOption],
    snapshot: &RateSnapshot,
    json: bool,
) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(options)?);
    }

    let mut out = String::new();
    for option in options {
        let rate = match snapshot.rate(option.code) {
            Some(rate) => Money::new(rate, option.currency()).to_string(),
            None => "no rate".to_string(),
        };
        writeln!(out, "{} {:<4} {:<20} {}", option.flag, option.code, option.name, rate)?;
    }
    Ok(out.trim_end().to_string())
}
