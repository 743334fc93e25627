/// Plain-text rendering of the Report View.
///
/// Shared by the `explore` terminal client and the `/explore/{zip}` route.
/// Nothing here decides what to show; it only lays out what `ReportView`
/// already derived.

use std::fmt::{self, Write};

use crate::model::Partition;
use crate::view::{ReportView, Screen, SortKey, ViewItem};

pub const FAILED_NOTICE: &str = "Could not load results.";
pub const EMPTY_NOTICE: &str = "No systems found for this ZIP.";
pub const RETRY_HINT: &str = "← Try another ZIP";

const METER_WIDTH: usize = 20;
const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Renders whatever screen `view` is on.
pub fn render(view: &mut ReportView) -> String {
    let mut out = String::new();
    let written = match view.screen() {
        Screen::Loading => render_loading(&mut out),
        Screen::Failed(_) => render_notice(&mut out, view.zip(), FAILED_NOTICE),
        Screen::Empty => render_notice(&mut out, view.zip(), EMPTY_NOTICE),
        Screen::Report => render_report(&mut out, view),
    };
    // formatting into a String only fails if a Display impl does
    written.map(|()| out).unwrap_or_default()
}

fn render_loading(out: &mut String) -> fmt::Result {
    writeln!(out, "ZIP ░░░░░")?;
    writeln!(out, "░░░░░░░░░░░░░░░░░░░░░░░░")?;
    for _ in 0..3 {
        writeln!(out, "  ░░░░░░░░░░░░  ░░░░░░")?;
    }
    Ok(())
}

fn render_notice(out: &mut String, zip: &str, message: &str) -> fmt::Result {
    writeln!(out, "ZIP {}", zip)?;
    writeln!(out, "{}", message)?;
    writeln!(out, "{}", RETRY_HINT)
}

fn render_report(out: &mut String, view: &mut ReportView) -> fmt::Result {
    let zip = view.zip().to_string();
    let (generated_at, count) = match view.response() {
        Some(r) => (r.meta.generated_at.clone(), r.meta.count),
        None => return Ok(()),
    };

    writeln!(out, "ZIP {}", zip)?;
    writeln!(out, "Water Quality Report")?;
    writeln!(out, "Updated {} · {} providers scanned", generated_at, count)?;
    writeln!(out, "{}", RULE)?;

    let providers: Vec<String> = view.providers().iter().map(|p| p.display_name().to_string()).collect();
    let active = view.active_index();

    if let Some(report) = view.active_report() {
        writeln!(
            out,
            "{} contaminants exceed health guidelines ({} total detected · {}% above guideline)",
            report.exceeding_count,
            report.total_count,
            crate::view::percent(report.exceeding_share())
        )?;
        writeln!(out, "Water provider:      {}", report.display_name())?;
        let population = report
            .population
            .map(|p| p.to_string())
            .unwrap_or_else(|| "—".to_string());
        writeln!(out, "Population affected: {}", population)?;
    }

    if providers.len() > 1 {
        writeln!(out, "\nView water providers in your area:")?;
        for (idx, name) in providers.iter().enumerate() {
            let marker = if idx == active { "▶" } else { " " };
            writeln!(out, " {} [{}] {}", marker, idx + 1, name)?;
        }
    }

    let showing = view.showing();
    let sort = view.sort();
    let query = view.query().to_string();
    let derived = view.derived();
    let exceeding_len = derived.exceeding.len();
    let other_len = derived.other.len();

    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "{} Exceeds ({})   {} Others ({})   Sort by: {}{}",
        if showing == Partition::Exceeding { "●" } else { "○" },
        exceeding_len,
        if showing == Partition::Other { "●" } else { "○" },
        other_len,
        match sort {
            SortKey::Severity => "severity",
            SortKey::Name => "name",
        },
        if query.trim().is_empty() {
            String::new()
        } else {
            format!("   Search: \"{}\"", query)
        }
    )?;
    writeln!(out)?;

    for item in derived.list(showing) {
        render_item(out, item)?;
    }

    writeln!(
        out,
        "Ratios compare utility averages against the health guideline. Meter scales up to 10×."
    )
}

fn render_item(out: &mut String, item: &ViewItem) -> fmt::Result {
    let entry = &item.entry;
    let unit = entry.unit_label();
    let ratio = if item.factor != 0.0 {
        format!("{:.2}×", item.factor)
    } else {
        "—".to_string()
    };

    writeln!(
        out,
        "{}  {}  [{}]",
        entry.name.as_deref().unwrap_or("Unknown"),
        ratio,
        item.tier
    )?;
    if let Some(effect) = &entry.health_effect {
        writeln!(out, "    Health risk: {}", effect)?;
    }

    let filled = (item.meter_percent as usize * METER_WIDTH + 50) / 100;
    writeln!(
        out,
        "    Guideline |{}{}| 10×",
        "█".repeat(filled),
        "·".repeat(METER_WIDTH - filled)
    )?;

    writeln!(out, "    This utility:     {}", value_with_unit(entry.system_average, unit))?;
    writeln!(out, "    Health guideline: {}", value_with_unit(entry.guideline, unit))?;
    let legal = match entry.effective_legal_limit() {
        Some(limit) => format!("{} {}", limit, unit).trim_end().to_string(),
        None => "No legal limit".to_string(),
    };
    writeln!(out, "    Legal limit:      {}", legal)?;
    writeln!(out)
}

fn value_with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{} {}", v, unit).trim_end().to_string(),
        None => "—".to_string(),
    }
}
