//! The `resolve` command: batch-resolve every configured indicator with
//! bounded concurrency and a wall-clock budget, then report outcomes.

use crate::config::AppConfig;
use crate::resolver::{ResolverResult, SourceResolver};
use crate::ui;
use anyhow::Result;
use comfy_table::Cell;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

struct IndicatorOutcome {
    index: usize,
    name: String,
    result: ResolverResult,
}

pub async fn run(config: &AppConfig, resolver: &SourceResolver) -> Result<()> {
    let total = config.indicators.len();
    info!("Resolving {} indicators...", total);
    if total == 0 {
        println!("No indicators configured.");
        return Ok(());
    }

    let budget = Duration::from_secs(config.resolution.budget_secs);
    let started = Instant::now();
    let pb = ui::new_progress_bar(total as u64, true);
    pb.set_message("resolving");

    let mut stream = futures::stream::iter(config.indicators.iter().enumerate().map(
        |(index, indicator)| async move {
            let result = resolver.resolve(indicator).await;
            IndicatorOutcome {
                index,
                name: indicator.name.clone(),
                result,
            }
        },
    ))
    .buffer_unordered(config.resolution.max_concurrency);

    let mut outcomes: Vec<IndicatorOutcome> = Vec::new();
    while let Some(outcome) = stream.next().await {
        pb.inc(1);
        outcomes.push(outcome);
        // The budget is checked between indicators: in-flight resolutions
        // finish, remaining ones are never started.
        if started.elapsed() > budget && outcomes.len() < total {
            warn!(
                resolved = outcomes.len(),
                total,
                "wall-clock budget exceeded, not starting remaining indicators"
            );
            break;
        }
    }
    drop(stream);
    pb.finish_and_clear();

    outcomes.sort_by_key(|o| o.index);
    display_outcomes(&outcomes, total);
    Ok(())
}

fn display_outcomes(outcomes: &[IndicatorOutcome], total: usize) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Indicator"),
        ui::header_cell("Source"),
        ui::header_cell("Points"),
        ui::header_cell("Latest"),
        ui::header_cell("Outcome"),
    ]);

    for outcome in outcomes {
        let result = &outcome.result;
        if result.success {
            let series = result.series.as_ref();
            table.add_row(vec![
                Cell::new(&outcome.name),
                Cell::new(result.source_used.as_deref().unwrap_or("?")),
                ui::format_optional_cell(series.map(|s| s.len()), |n| n.to_string()),
                ui::format_optional_cell(series.and_then(|s| s.last_valid_date()), |d| {
                    d.to_string()
                }),
                Cell::new("ok"),
            ]);
        } else {
            let outcome_text = result
                .error_type
                .map(|e| e.to_string())
                .unwrap_or_else(|| "failed".to_string());
            table.add_row(vec![
                Cell::new(&outcome.name),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
                Cell::new(ui::style_text(&outcome_text, ui::StyleType::Error)),
            ]);
        }
    }

    println!("{table}");

    for outcome in outcomes.iter().filter(|o| !o.result.success) {
        println!(
            "{}",
            ui::style_text(&format!("{}:", outcome.name), ui::StyleType::Title)
        );
        for attempt in &outcome.result.attempts {
            let detail = match (&attempt.error, attempt.http_status) {
                (Some(err), Some(status)) => format!(" ({err}, HTTP {status})"),
                (Some(err), None) => format!(" ({err})"),
                (None, Some(status)) => format!(" (HTTP {status})"),
                (None, None) => String::new(),
            };
            println!(
                "  {}",
                ui::style_text(
                    &format!("{}: {}{}", attempt.source, attempt.reason, detail),
                    ui::StyleType::Subtle
                )
            );
        }
    }

    if outcomes.len() < total {
        println!(
            "{}",
            ui::style_text(
                &format!("{} of {} indicators not attempted (budget)", total - outcomes.len(), total),
                ui::StyleType::Subtle
            )
        );
    }
}
