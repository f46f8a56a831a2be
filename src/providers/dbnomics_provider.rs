use crate::providers::util::{FetchError, RetryPolicy, fetch_with_fallback};
use crate::series::{Frequency, SeriesPoint, TimeSeries};
use crate::series_provider::SeriesProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

pub const SOURCE_NAME: &str = "dbnomics";

/// International-statistics aggregator queried by a
/// `provider/dataset/series` path, SDMX-style.
pub struct DbnomicsProvider {
    base_url: String,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl DbnomicsProvider {
    pub fn new(base_url: &str, client: reqwest::Client, policy: RetryPolicy) -> Self {
        DbnomicsProvider {
            base_url: base_url.to_string(),
            client,
            policy,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DbnomicsResponse {
    series: DbnomicsSeries,
}

#[derive(Debug, Deserialize)]
struct DbnomicsSeries {
    docs: Vec<DbnomicsDoc>,
}

#[derive(Debug, Deserialize)]
struct DbnomicsDoc {
    #[serde(default)]
    period: Vec<String>,
    #[serde(default)]
    value: Vec<Value>,
    series_name: Option<String>,
}

/// Parses an SDMX period string. Monthly ("2024-01"), quarterly ("2024-Q1")
/// and annual ("2024") periods are stamped to the first day of the period;
/// survey-style feeds publish whole-period observations this way.
fn parse_period(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some((year, quarter)) = s.split_once("-Q") {
        let year: i32 = year.parse().ok()?;
        let quarter: u32 = quarter.parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        return NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    let year: i32 = s.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn parse_doc(body: &str) -> Option<(Vec<SeriesPoint>, Option<String>)> {
    let response: DbnomicsResponse = serde_json::from_str(body).ok()?;
    let doc = response.series.docs.into_iter().next()?;
    let points: Vec<SeriesPoint> = doc
        .period
        .iter()
        .zip(doc.value.iter())
        .filter_map(|(period, value)| {
            let date = parse_period(period)?;
            // Missing observations arrive as the string "NA".
            Some(SeriesPoint {
                date,
                value: value.as_f64(),
            })
        })
        .collect();
    if points.is_empty() {
        None
    } else {
        Some((points, doc.series_name))
    }
}

#[async_trait]
impl SeriesProvider for DbnomicsProvider {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn validate_identifier(&self, series_id: &str) -> Result<(), String> {
        let segments: Vec<&str> = series_id.split('/').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(format!(
                "expected provider/dataset/series identifier: '{series_id}'"
            ));
        }
        Ok(())
    }

    #[instrument(name = "DbnomicsFetch", skip(self), fields(series_id = %series_id))]
    async fn fetch_series(
        &self,
        series_id: &str,
        frequency: Frequency,
        start: Option<NaiveDate>,
    ) -> Result<TimeSeries, FetchError> {
        let url = format!(
            "{}/v22/series/{}?observations=1&format=json",
            self.base_url, series_id
        );
        debug!("Requesting series from {}", url);

        let (mut points, series_name) =
            fetch_with_fallback(&self.client, &[url], &self.policy, parse_doc).await?;
        if let Some(start) = start {
            points.retain(|p| p.date >= start);
        }

        let name = series_name.unwrap_or_else(|| series_id.to_string());
        Ok(TimeSeries::new(
            series_id,
            SOURCE_NAME,
            series_id,
            name,
            frequency,
            None,
            points,
        ))
    }
}
