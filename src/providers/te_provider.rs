use crate::providers::util::{FetchError, RetryPolicy, fetch_with_fallback};
use crate::series::{Frequency, SeriesPoint, TimeSeries};
use crate::series_provider::SeriesProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const SOURCE_NAME: &str = "tradingeconomics";

const IDENTIFIER_MAX_LEN: usize = 80;

/// Commercial API queried by `country/indicator` name. The service exposes
/// the same data under more than one URL shape depending on plan and
/// vintage, so both are tried in order.
pub struct TradingEconomicsProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl TradingEconomicsProvider {
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client, policy: RetryPolicy) -> Self {
        TradingEconomicsProvider {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client,
            policy,
        }
    }

    fn endpoint_variants(&self, country: &str, indicator: &str) -> Vec<String> {
        let country = country.replace(' ', "%20");
        let indicator = indicator.replace(' ', "%20");
        vec![
            format!(
                "{}/historical/country/{}/indicator/{}?c={}&format=json",
                self.base_url, country, indicator, self.api_key
            ),
            format!(
                "{}/country/{}/indicator/{}?c={}&format=json",
                self.base_url, country, indicator, self.api_key
            ),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct TeObservation {
    #[serde(rename = "DateTime", alias = "Date", alias = "LatestValueDate")]
    date_time: String,
    #[serde(rename = "Value", alias = "LatestValue")]
    value: Option<f64>,
}

fn parse_observations(body: &str) -> Option<Vec<SeriesPoint>> {
    let rows: Vec<TeObservation> = serde_json::from_str(body).ok()?;
    let points: Vec<SeriesPoint> = rows
        .iter()
        .filter_map(|row| {
            // "2024-01-31T00:00:00", only the date part matters.
            let date = NaiveDate::parse_from_str(row.date_time.get(..10)?, "%Y-%m-%d").ok()?;
            Some(SeriesPoint {
                date,
                value: row.value,
            })
        })
        .collect();
    if points.is_empty() { None } else { Some(points) }
}

#[async_trait]
impl SeriesProvider for TradingEconomicsProvider {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn validate_identifier(&self, series_id: &str) -> Result<(), String> {
        if series_id.len() > IDENTIFIER_MAX_LEN {
            return Err(format!("identifier too long: '{series_id}'"));
        }
        match series_id.split_once('/') {
            Some((country, indicator))
                if !country.trim().is_empty() && !indicator.trim().is_empty() =>
            {
                Ok(())
            }
            _ => Err(format!(
                "expected country/indicator identifier: '{series_id}'"
            )),
        }
    }

    #[instrument(name = "TradingEconomicsFetch", skip(self), fields(series_id = %series_id))]
    async fn fetch_series(
        &self,
        series_id: &str,
        frequency: Frequency,
        start: Option<NaiveDate>,
    ) -> Result<TimeSeries, FetchError> {
        let (country, indicator) = series_id
            .split_once('/')
            .expect("identifier validated before fetch");
        let endpoints = self.endpoint_variants(country, indicator);
        debug!(candidates = endpoints.len(), "trying endpoint variants");

        let mut points =
            fetch_with_fallback(&self.client, &endpoints, &self.policy, parse_observations).await?;
        if let Some(start) = start {
            points.retain(|p| p.date >= start);
        }

        Ok(TimeSeries::new(
            series_id,
            SOURCE_NAME,
            series_id,
            indicator,
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

    fn provider(base_url: &str) -> TradingEconomicsProvider {
        TradingEconomicsProvider::new(
            base_url,
            "guest:guest",
            reqwest::Client::new(),
            RetryPolicy {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn test_historical_endpoint_preferred() {
        let server = MockServer::start().await;
        let body = r#"[
            {"DateTime": "2024-01-31T00:00:00", "Value": 3.1},
            {"DateTime": "2024-02-29T00:00:00", "Value": 3.2}
        ]"#;
        Mock::given(method("GET"))
            .and(path("/historical/country/sweden/indicator/inflation"))
            .and(query_param("c", "guest:guest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let series = provider(&server.uri())
            .fetch_series("sweden/inflation", Frequency::Monthly, None)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.name, "inflation");
        assert_eq!(series.source_name, "tradingeconomics");
    }

    #[test]
    fn test_endpoint_variants_encode_spaces() {
        let p = provider("http://example.com");
        let urls = p.endpoint_variants("united states", "inflation cpi");
        assert_eq!(
            urls[0],
            "http://example.com/historical/country/united%20states/indicator/inflation%20cpi?c=guest:guest&format=json"
        );
        assert!(urls[1].starts_with("http://example.com/country/united%20states/"));
    }

    #[tokio::test]
    async fn test_falls_back_to_second_endpoint_shape() {
        let server = MockServer::start().await;
        // Historical shape is empty on this plan; the summary shape works.
        Mock::given(method("GET"))
            .and(path("/historical/country/sweden/indicator/gdp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;
        let body = r#"[{"LatestValueDate": "2024-03-31T00:00:00", "LatestValue": 635.0}]"#;
        Mock::given(method("GET"))
            .and(path("/country/sweden/indicator/gdp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let series = provider(&server.uri())
            .fetch_series("sweden/gdp", Frequency::Quarterly, None)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points[0].value, Some(635.0));
    }

    #[tokio::test]
    async fn test_auth_failure_stops_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/historical/country/sweden/indicator/gdp"))
            .respond_with(ResponseTemplate::new(403).set_body_string("upgrade your plan"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/country/sweden/indicator/gdp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .fetch_series("sweden/gdp", Frequency::Quarterly, None)
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(403));
        assert_eq!(err.body, "upgrade your plan");
    }

    #[test]
    fn test_validate_identifier() {
        let p = provider("http://example.com");
        assert!(p.validate_identifier("united states/inflation cpi").is_ok());
        assert!(p.validate_identifier("sweden/gdp").is_ok());
        assert!(p.validate_identifier("nocountry").is_err());
        assert!(p.validate_identifier("/gdp").is_err());
        assert!(p.validate_identifier("sweden/").is_err());
        assert!(p.validate_identifier(&"x/".repeat(60)).is_err());
    }
}
