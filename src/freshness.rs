//! Freshness classification of an indicator's latest observation, and the
//! `freshness` command built on top of it.

use crate::config::AppConfig;
use crate::resolver::SourceResolver;
use crate::series::{Frequency, TimeSeries};
use crate::ui;
use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use comfy_table::Cell;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessStatus {
    Fresh,
    Stale,
    Old,
}

impl std::fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FreshnessStatus::Fresh => write!(f, "fresh"),
            FreshnessStatus::Stale => write!(f, "stale"),
            FreshnessStatus::Old => write!(f, "old"),
        }
    }
}

/// Latest usable observation of a series with its age classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestAvailableValue {
    pub observation: f64,
    pub last_date: NaiveDate,
    pub age_days: i64,
    pub status: FreshnessStatus,
}

/// Maximum acceptable age in days of the latest observation, per frequency.
pub fn max_age_days(frequency: Frequency) -> i64 {
    match frequency {
        Frequency::Daily => 7,
        Frequency::Weekly => 21,
        Frequency::Monthly => 75,
        Frequency::Quarterly => 140,
        Frequency::Annual => 400,
    }
}

/// Age-based classification: under half the budget is fresh, within budget
/// is stale, beyond it is old.
pub fn evaluate(last_date: NaiveDate, frequency: Frequency, today: NaiveDate) -> (i64, FreshnessStatus) {
    let age_days = (today - last_date).num_days();
    let max_age = max_age_days(frequency);
    let ratio = age_days as f64 / max_age as f64;
    let status = if ratio < 0.5 {
        FreshnessStatus::Fresh
    } else if ratio < 1.0 {
        FreshnessStatus::Stale
    } else {
        FreshnessStatus::Old
    };
    (age_days, status)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// How many reporting periods back an observation falls (0 = current period).
fn periods_behind(date: NaiveDate, today: NaiveDate, frequency: Frequency) -> Option<i32> {
    match frequency {
        Frequency::Monthly => Some(month_index(today) - month_index(date)),
        Frequency::Quarterly => Some(month_index(today) / 3 - month_index(date) / 3),
        _ => None,
    }
}

/// Picks the newest usable observation: nulls are skipped and future-dated
/// points are always rejected.
///
/// Monthly points stamped on the 1st cover their whole month (survey-style
/// feeds publish this way), so a point whose month has begun is not future.
pub fn latest_available(series: &TimeSeries, today: NaiveDate) -> Option<LatestAvailableValue> {
    for point in series.points.iter().rev() {
        if point.date > today {
            debug!(id = %series.id, date = %point.date, "skipping future-dated observation");
            continue;
        }
        let Some(observation) = point.value else {
            continue;
        };
        if let Some(behind) = periods_behind(point.date, today, series.frequency) {
            if behind > 1 {
                // Older than the prior period: still reported, the age policy
                // classifies it, but worth a trace for the alerting layer.
                debug!(
                    id = %series.id,
                    date = %point.date,
                    periods_behind = behind,
                    "latest observation predates the prior reporting period"
                );
            }
        }
        let (age_days, status) = evaluate(point.date, series.frequency, today);
        return Some(LatestAvailableValue {
            observation,
            last_date: point.date,
            age_days,
            status,
        });
    }
    None
}

/// Resolve every configured indicator and print a freshness report.
pub async fn run(config: &AppConfig, resolver: &SourceResolver) -> Result<()> {
    let today = Utc::now().date_naive();
    let pb = ui::new_progress_bar(config.indicators.len() as u64, false);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Indicator"),
        ui::header_cell("Latest"),
        ui::header_cell("Date"),
        ui::header_cell("Age (d)"),
        ui::header_cell("Status"),
    ]);

    for indicator in &config.indicators {
        let result = resolver.resolve(indicator).await;
        pb.inc(1);

        let row = match result.series.as_ref().and_then(|s| latest_available(s, today)) {
            Some(latest) => vec![
                Cell::new(&indicator.name),
                Cell::new(format!("{:.2}", latest.observation)),
                Cell::new(latest.last_date.to_string()),
                Cell::new(latest.age_days.to_string()),
                ui::freshness_cell(latest.status),
            ],
            None => {
                let reason = result
                    .error_type
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no usable observation".to_string());
                vec![
                    Cell::new(&indicator.name),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    Cell::new(ui::style_text(&reason, ui::StyleType::Error)),
                ]
            }
        };
        table.add_row(row);
    }
    pb.finish_and_clear();

    println!("{table}");
    Ok(())
}
