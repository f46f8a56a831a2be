//! Common time series types shared by all providers and the analytics layer.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Reporting frequency of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "A")]
    Annual,
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Frequency::Daily => "D",
                Frequency::Weekly => "W",
                Frequency::Monthly => "M",
                Frequency::Quarterly => "Q",
                Frequency::Annual => "A",
            }
        )
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" => Ok(Frequency::Daily),
            "W" => Ok(Frequency::Weekly),
            "M" => Ok(Frequency::Monthly),
            "Q" => Ok(Frequency::Quarterly),
            "A" => Ok(Frequency::Annual),
            _ => Err(anyhow::anyhow!("Invalid frequency: {}", s)),
        }
    }
}

/// One dated observation. `None` means the source reported the date with a
/// missing value ("." in FRED, "NA" in DBnomics).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// A resolved indicator series in the common shape every provider parses into.
///
/// Points are strictly ascending by date with at most one point per date;
/// values are finite or `None`, never NaN/Infinity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub id: String,
    pub source_name: String,
    pub native_id: String,
    pub name: String,
    pub frequency: Frequency,
    pub unit: Option<String>,
    pub points: Vec<SeriesPoint>,
    pub last_updated: Option<NaiveDate>,
}

impl TimeSeries {
    /// Builds a series while enforcing the point invariants: sort ascending,
    /// keep the later of duplicate dates, map non-finite values to `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        source_name: impl Into<String>,
        native_id: impl Into<String>,
        name: impl Into<String>,
        frequency: Frequency,
        unit: Option<String>,
        mut points: Vec<SeriesPoint>,
    ) -> Self {
        points.sort_by_key(|p| p.date);
        // dedup_by keeps the FIRST of each run, so walk the run backwards:
        // swap the later value into the survivor before dropping it.
        points.dedup_by(|later, kept| {
            if later.date == kept.date {
                kept.value = later.value;
                true
            } else {
                false
            }
        });
        for p in &mut points {
            if let Some(v) = p.value {
                if !v.is_finite() {
                    p.value = None;
                }
            }
        }
        let last_updated = points.last().map(|p| p.date);
        TimeSeries {
            id: id.into(),
            source_name: source_name.into(),
            native_id: native_id.into(),
            name: name.into(),
            frequency,
            unit,
            points,
            last_updated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Dated, finite observations only, oldest first.
    pub fn valid_points(&self) -> Vec<(NaiveDate, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.date, v)))
            .collect()
    }

    /// Date of the newest non-null observation.
    pub fn last_valid_date(&self) -> Option<NaiveDate> {
        self.points
            .iter()
            .rev()
            .find(|p| p.value.is_some())
            .map(|p| p.date)
    }
}
