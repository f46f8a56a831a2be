use crate::providers::util::FetchError;
use crate::series::{Frequency, TimeSeries};
use async_trait::async_trait;
use chrono::NaiveDate;

/// One upstream data source able to serve indicator series.
///
/// Each adapter parses its own response shape into the common [`TimeSeries`]
/// form; callers treat the fetch as a black box.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Stable source name used in config, attempt logs and results.
    fn name(&self) -> &'static str;

    /// Checks the provider-native identifier shape. Must be called before
    /// any network I/O; a failure means the config is wrong, not the source.
    fn validate_identifier(&self, series_id: &str) -> Result<(), String>;

    /// Fetches the series identified by `series_id`, optionally restricted
    /// to observations on or after `start`.
    async fn fetch_series(
        &self,
        series_id: &str,
        frequency: Frequency,
        start: Option<NaiveDate>,
    ) -> Result<TimeSeries, FetchError>;
}
