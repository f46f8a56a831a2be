use macropulse::config::AppConfig;
use macropulse::resolver::ResolutionErrorType;
use std::io::Write;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_fred_mock_server(mock_response: &str, status: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_dbnomics_mock_server(series_path: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let url_path = format!("/v22/series/{series_path}");

        Mock::given(method("GET"))
            .and(path(&url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

const FRED_CPI_BODY: &str = r#"{
    "observations": [
        {"date": "2023-01-01", "value": "299.170"},
        {"date": "2023-02-01", "value": "300.840"},
        {"date": "2024-01-01", "value": "308.417"},
        {"date": "2024-02-01", "value": "310.326"}
    ]
}"#;

#[test_log::test(tokio::test)]
async fn test_resolution_through_config_with_fred_mock() {
    let fred = test_utils::create_fred_mock_server(FRED_CPI_BODY, 200).await;

    let config_content = format!(
        r#"
indicators:
  - id: us_cpi
    name: "US CPI"
    frequency: M
    sources:
      - provider: fred
        series_id: CPIAUCSL
providers:
  fred:
    base_url: {}
    api_key: "test"
"#,
        fred.uri()
    );
    let config_file = write_config(&config_content);

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let resolver = macropulse::build_resolver(&config).unwrap();

    let result = resolver.resolve(&config.indicators[0]).await;
    info!(source = ?result.source_used, "resolution finished");

    assert!(result.success);
    assert_eq!(result.source_used.as_deref(), Some("fred"));
    let series = result.series.unwrap();
    assert_eq!(series.id, "us_cpi");
    assert_eq!(series.len(), 4);
    assert_eq!(series.points[0].value, Some(299.170));
}

#[test_log::test(tokio::test)]
async fn test_fallback_to_aggregator_when_primary_is_down() {
    let fred = test_utils::create_fred_mock_server("internal error", 500).await;
    let dbnomics_body = r#"{
        "series": {
            "docs": [{
                "series_name": "CPI all urban",
                "period": ["2024-01", "2024-02"],
                "value": [308.4, 310.3]
            }]
        }
    }"#;
    let dbnomics =
        test_utils::create_dbnomics_mock_server("BLS/cu/CUSR0000SA0", dbnomics_body).await;

    let config_content = format!(
        r#"
indicators:
  - id: us_cpi
    name: "US CPI"
    frequency: M
    sources:
      - provider: fred
        series_id: CPIAUCSL
      - provider: dbnomics
        series_id: BLS/cu/CUSR0000SA0
providers:
  fred:
    base_url: {}
    api_key: "test"
  dbnomics:
    base_url: {}
"#,
        fred.uri(),
        dbnomics.uri()
    );
    let config_file = write_config(&config_content);

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let resolver = macropulse::build_resolver(&config).unwrap();

    let result = resolver.resolve(&config.indicators[0]).await;

    assert!(result.success);
    assert_eq!(result.source_used.as_deref(), Some("dbnomics"));
    assert_eq!(result.attempts.len(), 2);
    assert!(result.attempts[0].attempted);
    assert_eq!(result.attempts[0].http_status, Some(500));
    assert_eq!(result.attempts[1].reason, "ok");
}

#[test_log::test(tokio::test)]
async fn test_disabled_primary_never_receives_requests() {
    let fred = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(FRED_CPI_BODY))
        .expect(0)
        .mount(&fred)
        .await;

    let dbnomics_body = r#"{
        "series": {
            "docs": [{
                "period": ["2024-01"],
                "value": [308.4]
            }]
        }
    }"#;
    let dbnomics =
        test_utils::create_dbnomics_mock_server("BLS/cu/CUSR0000SA0", dbnomics_body).await;

    let config_content = format!(
        r#"
indicators:
  - id: us_cpi
    name: "US CPI"
    frequency: M
    sources:
      - provider: fred
        series_id: CPIAUCSL
      - provider: dbnomics
        series_id: BLS/cu/CUSR0000SA0
providers:
  fred:
    base_url: {}
    api_key: "test"
    enabled: false
  dbnomics:
    base_url: {}
"#,
        fred.uri(),
        dbnomics.uri()
    );
    let config_file = write_config(&config_content);

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let resolver = macropulse::build_resolver(&config).unwrap();

    let result = resolver.resolve(&config.indicators[0]).await;

    assert!(result.success);
    assert_eq!(result.source_used.as_deref(), Some("dbnomics"));
    assert_eq!(result.attempts[0].reason, "SOURCE_DISABLED");
    assert!(!result.attempts[0].attempted);
}

#[test_log::test(tokio::test)]
async fn test_rate_limited_all_the_way_down() {
    let fred = test_utils::create_fred_mock_server("quota exceeded", 429).await;

    let config_content = format!(
        r#"
indicators:
  - id: us_cpi
    name: "US CPI"
    frequency: M
    sources:
      - provider: fred
        series_id: CPIAUCSL
providers:
  fred:
    base_url: {}
    api_key: "test"
resolution:
  max_retries: 3
  base_delay_ms: 10
"#,
        fred.uri()
    );
    let config_file = write_config(&config_content);

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let resolver = macropulse::build_resolver(&config).unwrap();

    let result = resolver.resolve(&config.indicators[0]).await;

    assert!(!result.success);
    assert_eq!(result.error_type, Some(ResolutionErrorType::RateLimited));
    // One endpoint, three attempts: the mock saw every retry.
    assert_eq!(fred.received_requests().await.unwrap().len(), 3);
}

#[test_log::test(tokio::test)]
async fn test_yoy_transform_applied_end_to_end() {
    let fred = test_utils::create_fred_mock_server(FRED_CPI_BODY, 200).await;

    let config_content = format!(
        r#"
indicators:
  - id: us_cpi_yoy
    name: "US CPI YoY"
    frequency: M
    transform: yoy
    sources:
      - provider: fred
        series_id: CPIAUCSL
providers:
  fred:
    base_url: {}
    api_key: "test"
"#,
        fred.uri()
    );
    let config_file = write_config(&config_content);

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let resolver = macropulse::build_resolver(&config).unwrap();

    let result = resolver.resolve(&config.indicators[0]).await;

    assert!(result.success);
    let series = result.series.unwrap();
    assert_eq!(series.unit.as_deref(), Some("%"));
    // 2023 points have no prior-year observation.
    assert_eq!(series.points[0].value, None);
    assert_eq!(series.points[1].value, None);
    let jan_yoy = series.points[2].value.unwrap();
    assert!((jan_yoy - (308.417 / 299.170 - 1.0) * 100.0).abs() < 1e-9);
}
