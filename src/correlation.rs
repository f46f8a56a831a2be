//! Rolling-window correlation between two resolved series.
//!
//! Returns are winsorized before the Pearson computation so a single outlier
//! print from an upstream feed cannot dominate the statistic.

use crate::series::TimeSeries;
use crate::transform::{self, DEFAULT_MAX_FFILL_DAYS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A correlation window result is rejected when its newest aligned point is
/// older than this many calendar days.
pub const STALENESS_LIMIT_DAYS: i64 = 20;

/// Winsorization percentiles applied to each return series.
pub const DEFAULT_WINSOR_LOWER: f64 = 0.01;
pub const DEFAULT_WINSOR_UPPER: f64 = 0.99;

/// Named correlation window, e.g. "12m" -> 252 trading days / 150 min obs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CorrelationWindow {
    pub trading_days: usize,
    pub min_observations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Pearson r in [-1, 1], or `None` when any gate rejected the window.
    pub correlation: Option<f64>,
    pub n_observations: usize,
    pub last_asset_date: Option<NaiveDate>,
    pub last_base_date: Option<NaiveDate>,
}

impl CorrelationResult {
    fn rejected(n_observations: usize, asset: &TimeSeries, base: &TimeSeries) -> Self {
        CorrelationResult {
            correlation: None,
            n_observations,
            last_asset_date: asset.last_valid_date(),
            last_base_date: base.last_valid_date(),
        }
    }
}

/// Min-observation default: long windows need a meaningful share of a
/// trading year, short windows a few dozen points.
pub fn default_min_observations(window_days: usize) -> usize {
    if window_days >= 200 { 150 } else { 40 }
}

/// Rolling Pearson correlation of log-returns over the most recent
/// `window_days` aligned observations.
///
/// Never fails on data insufficiency: every gate returns a well-formed
/// result with `correlation: None` and the observation count it saw.
pub fn compute_correlation(
    asset: &TimeSeries,
    base: &TimeSeries,
    window_days: usize,
    min_observations: Option<usize>,
    today: NaiveDate,
) -> CorrelationResult {
    let min_obs = min_observations.unwrap_or_else(|| default_min_observations(window_days));

    let aligned = transform::align_series(asset, base, DEFAULT_MAX_FFILL_DAYS, today);
    if window_days == 0 || aligned.len() < window_days {
        debug!(
            aligned = aligned.len(),
            window_days, "insufficient aligned history"
        );
        return CorrelationResult::rejected(aligned.len(), asset, base);
    }

    let window = &aligned[aligned.len() - window_days..];
    let last_date = window[window.len() - 1].date;
    if (today - last_date).num_days() > STALENESS_LIMIT_DAYS {
        debug!(%last_date, "aligned window is stale, rejecting correlation");
        return CorrelationResult::rejected(window.len(), asset, base);
    }

    let series1: Vec<_> = window.iter().map(|p| (p.date, p.value1)).collect();
    let series2: Vec<_> = window.iter().map(|p| (p.date, p.value2)).collect();
    let returns1: BTreeMap<_, _> = transform::log_returns(&series1).into_iter().collect();
    let returns2: BTreeMap<_, _> = transform::log_returns(&series2).into_iter().collect();

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (date, r1) in &returns1 {
        if let Some(r2) = returns2.get(date) {
            xs.push(*r1);
            ys.push(*r2);
        }
    }

    if xs.len() < min_obs {
        debug!(
            n = xs.len(),
            min_obs, "too few overlapping returns for correlation"
        );
        return CorrelationResult::rejected(xs.len(), asset, base);
    }

    let xs = winsorize(&xs, DEFAULT_WINSOR_LOWER, DEFAULT_WINSOR_UPPER);
    let ys = winsorize(&ys, DEFAULT_WINSOR_LOWER, DEFAULT_WINSOR_UPPER);

    let correlation = pearson(&xs, &ys).filter(|r| r.is_finite());
    CorrelationResult {
        correlation,
        n_observations: xs.len(),
        last_asset_date: asset.last_valid_date(),
        last_base_date: base.last_valid_date(),
    }
}

/// Clamps every value into the `[lower, upper]` percentile bounds of the
/// input distribution.
pub fn winsorize(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lo_idx = ((lower * n as f64).floor() as usize).min(n - 1);
    let hi_idx = ((upper * n as f64).floor() as usize).min(n - 1);
    let lo = sorted[lo_idx];
    let hi = sorted[hi_idx];
    values.iter().map(|v| v.clamp(lo, hi)).collect()
}

/// Pearson correlation of two equal-length sequences. `None` when fewer than
/// two points or either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }
    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}
