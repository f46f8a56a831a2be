use crate::providers::util::{FetchError, RetryPolicy, fetch_with_fallback};
use crate::series::{Frequency, SeriesPoint, TimeSeries};
use crate::series_provider::SeriesProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const SOURCE_NAME: &str = "fred";

const SERIES_CODE_MAX_LEN: usize = 25;

/// Official statistics API queried by series code, api key in the query
/// string, observation values encoded as strings ("." = missing).
pub struct FredProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl FredProvider {
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client, policy: RetryPolicy) -> Self {
        FredProvider {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client,
            policy,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FredResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

fn parse_observations(body: &str) -> Option<Vec<SeriesPoint>> {
    let response: FredResponse = serde_json::from_str(body).ok()?;
    if response.observations.is_empty() {
        return None;
    }
    let points: Vec<SeriesPoint> = response
        .observations
        .iter()
        .filter_map(|obs| {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok()?;
            // "." marks a date the source reports without a value.
            let value = if obs.value == "." {
                None
            } else {
                obs.value.parse::<f64>().ok()
            };
            Some(SeriesPoint { date, value })
        })
        .collect();
    if points.is_empty() { None } else { Some(points) }
}

#[async_trait]
impl SeriesProvider for FredProvider {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn validate_identifier(&self, series_id: &str) -> Result<(), String> {
        if series_id.is_empty() || series_id.len() > SERIES_CODE_MAX_LEN {
            return Err(format!(
                "series code must be 1-{SERIES_CODE_MAX_LEN} chars: '{series_id}'"
            ));
        }
        if !series_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(format!("series code has invalid characters: '{series_id}'"));
        }
        Ok(())
    }

    #[instrument(name = "FredFetch", skip(self), fields(series_id = %series_id))]
    async fn fetch_series(
        &self,
        series_id: &str,
        frequency: Frequency,
        start: Option<NaiveDate>,
    ) -> Result<TimeSeries, FetchError> {
        let mut url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json",
            self.base_url, series_id, self.api_key
        );
        if let Some(start) = start {
            url.push_str(&format!("&observation_start={start}"));
        }
        debug!("Requesting observations from {}", url);

        let points =
            fetch_with_fallback(&self.client, &[url], &self.policy, parse_observations).await?;

        Ok(TimeSeries::new(
            series_id,
            SOURCE_NAME,
            series_id,
            series_id,
            frequency,
            None,
            points,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> FredProvider {
        FredProvider::new(
            base_url,
            "test-key",
            reqwest::Client::new(),
            RetryPolicy {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(5),
            },
        )
    }

    async fn mock_observations(server: &MockServer, series_id: &str, body: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .and(query_param("series_id", series_id))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_fetch_with_missing_values() {
        let server = MockServer::start().await;
        let body = r#"{
            "observations": [
                {"date": "2024-01-01", "value": "308.417"},
                {"date": "2024-02-01", "value": "."},
                {"date": "2024-03-01", "value": "310.326"}
            ]
        }"#;
        mock_observations(&server, "CPIAUCSL", body, 200).await;

        let series = provider(&server.uri())
            .fetch_series("CPIAUCSL", Frequency::Monthly, None)
            .await
            .unwrap();

        assert_eq!(series.source_name, "fred");
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].value, Some(308.417));
        assert_eq!(series.points[1].value, None);
        assert_eq!(series.last_updated, Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_bad_request_class() {
        let server = MockServer::start().await;
        mock_observations(&server, "NOPE", r#"{"error_message": "not found"}"#, 404).await;

        let err = provider(&server.uri())
            .fetch_series("NOPE", Frequency::Monthly, None)
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn test_empty_observations_is_no_data() {
        let server = MockServer::start().await;
        mock_observations(&server, "EMPTY", r#"{"observations": []}"#, 200).await;

        let err = provider(&server.uri())
            .fetch_series("EMPTY", Frequency::Monthly, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::providers::util::FetchErrorKind::NoData);
    }

    #[test]
    fn test_validate_identifier() {
        let p = provider("http://example.com");
        assert!(p.validate_identifier("CPIAUCSL").is_ok());
        assert!(p.validate_identifier("T10Y2Y").is_ok());
        assert!(p.validate_identifier("A.B_C1").is_ok());
        assert!(p.validate_identifier("").is_err());
        assert!(p.validate_identifier("has space").is_err());
        assert!(p.validate_identifier("semi;colon").is_err());
        assert!(p.validate_identifier(&"X".repeat(26)).is_err());
    }
}
