//! Series alignment and derivation transforms.
//!
//! Everything here is a pure, total function over date/value pairs: missing
//! or invalid inputs yield `None`, never an error.

use crate::series::{SeriesPoint, TimeSeries};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Longest calendar-day gap a forward-filled value may bridge.
pub const DEFAULT_MAX_FFILL_DAYS: i64 = 3;

const YOY_TOLERANCE_DAYS: i64 = 30;
const MOM_TOLERANCE_DAYS: i64 = 15;

/// A date where both input series have a (possibly forward-filled) value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPoint {
    pub date: NaiveDate,
    pub value1: f64,
    pub value2: f64,
}

/// Derivation applied to a level series after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Year-over-year percent change.
    Yoy,
    /// Month-over-month absolute change.
    Mom,
    /// Month-over-month percent change.
    MomPct,
}

/// Value of `series` on `date`, forward-filling from the most recent prior
/// observation when the gap is at most `max_ffill_days` calendar days.
fn value_at(points: &[(NaiveDate, f64)], date: NaiveDate, max_ffill_days: i64) -> Option<f64> {
    let idx = points.partition_point(|(d, _)| *d <= date);
    if idx == 0 {
        return None;
    }
    let (obs_date, value) = points[idx - 1];
    if (date - obs_date).num_days() <= max_ffill_days {
        Some(value)
    } else {
        None
    }
}

/// Aligns two series on the ordered set of dates where both have a value.
///
/// Dates strictly after `today` are excluded; upstream feeds occasionally
/// carry clock-skewed or placeholder future observations.
pub fn align_series(
    a: &TimeSeries,
    b: &TimeSeries,
    max_ffill_days: i64,
    today: NaiveDate,
) -> Vec<AlignedPoint> {
    let pa: Vec<_> = a
        .valid_points()
        .into_iter()
        .filter(|(d, _)| *d <= today)
        .collect();
    let pb: Vec<_> = b
        .valid_points()
        .into_iter()
        .filter(|(d, _)| *d <= today)
        .collect();
    if pa.is_empty() || pb.is_empty() {
        return Vec::new();
    }

    let mut dates: Vec<NaiveDate> = pa.iter().chain(pb.iter()).map(|(d, _)| *d).collect();
    dates.sort();
    dates.dedup();

    dates
        .into_iter()
        .filter_map(|date| {
            let value1 = value_at(&pa, date, max_ffill_days)?;
            let value2 = value_at(&pb, date, max_ffill_days)?;
            Some(AlignedPoint {
                date,
                value1,
                value2,
            })
        })
        .collect()
}

/// Log-returns `ln(v_t / v_{t-1})` over consecutive entries. A return is
/// emitted at date `t` only when both endpoints are positive and finite.
pub fn log_returns(points: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    points
        .windows(2)
        .filter_map(|w| {
            let (_, prev) = w[0];
            let (date, cur) = w[1];
            if prev > 0.0 && cur > 0.0 && prev.is_finite() && cur.is_finite() {
                let r = (cur / prev).ln();
                r.is_finite().then_some((date, r))
            } else {
                None
            }
        })
        .collect()
}

/// The observation closest to `target`, if any lies within `tolerance_days`.
fn closest_within(
    points: &[(NaiveDate, f64)],
    target: NaiveDate,
    tolerance_days: i64,
) -> Option<f64> {
    points
        .iter()
        .filter(|(d, _)| (*d - target).num_days().abs() <= tolerance_days)
        .min_by_key(|(d, _)| (*d - target).num_days().abs())
        .map(|(_, v)| *v)
}

/// Year-over-year percent change at `date`: prior observation ~12 months
/// back within a ±30 day window, prior value must be positive.
pub fn yoy_at(points: &[(NaiveDate, f64)], date: NaiveDate, current: f64) -> Option<f64> {
    let target = date.checked_sub_months(Months::new(12))?;
    let prior = closest_within(points, target, YOY_TOLERANCE_DAYS)?;
    if prior > 0.0 && prior.is_finite() && current.is_finite() {
        Some((current / prior - 1.0) * 100.0)
    } else {
        None
    }
}

/// Month-over-month change at `date`: prior observation ~1 month back within
/// a ±15 day window. Absolute delta, or percent when `ratio` is set.
pub fn month_change_at(
    points: &[(NaiveDate, f64)],
    date: NaiveDate,
    current: f64,
    ratio: bool,
) -> Option<f64> {
    let target = date.checked_sub_months(Months::new(1))?;
    let prior = closest_within(points, target, MOM_TOLERANCE_DAYS)?;
    if !prior.is_finite() || !current.is_finite() {
        return None;
    }
    if ratio {
        if prior > 0.0 {
            Some((current / prior - 1.0) * 100.0)
        } else {
            None
        }
    } else {
        Some(current - prior)
    }
}

/// Derives a new series by applying `kind` at every observation date. Points
/// whose lookback fails carry `None` so date coverage is preserved.
pub fn apply_transform(series: &TimeSeries, kind: TransformKind) -> TimeSeries {
    let levels = series.valid_points();
    let points = series
        .points
        .iter()
        .map(|p| {
            let value = p.value.and_then(|v| match kind {
                TransformKind::Yoy => yoy_at(&levels, p.date, v),
                TransformKind::Mom => month_change_at(&levels, p.date, v, false),
                TransformKind::MomPct => month_change_at(&levels, p.date, v, true),
            });
            SeriesPoint {
                date: p.date,
                value,
            }
        })
        .collect();

    let unit = match kind {
        TransformKind::Yoy | TransformKind::MomPct => Some("%".to_string()),
        TransformKind::Mom => series.unit.clone(),
    };
    TimeSeries::new(
        series.id.clone(),
        series.source_name.clone(),
        series.native_id.clone(),
        series.name.clone(),
        series.frequency,
        unit,
        points,
    )
}
