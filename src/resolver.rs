//! Priority-ordered resolution of one indicator across configured providers.
//!
//! Provider failures are absorbed and classified here; a resolution never
//! fails with an error for expected upstream conditions. Callers receive a
//! [`ResolverResult`] with a structured attempt log either way.

use crate::config::IndicatorConfig;
use crate::series::TimeSeries;
use crate::series_provider::SeriesProvider;
use crate::transform;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const REASON_MISCONFIG: &str = "MISCONFIG";
pub const REASON_SOURCE_DISABLED: &str = "SOURCE_DISABLED";
pub const REASON_NO_DATA: &str = "no data";
pub const REASON_OK: &str = "ok";

/// Outcome of one provider slot during a resolution, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: String,
    pub attempted: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// Aggregate classification when no provider yielded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionErrorType {
    #[serde(rename = "MISCONFIG")]
    Misconfig,
    #[serde(rename = "RATE_LIMITED")]
    RateLimited,
    #[serde(rename = "SOURCE_DOWN")]
    SourceDown,
    #[serde(rename = "NO_DATA")]
    NoData,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "not_available_in_source")]
    NotAvailableInSource,
    #[serde(rename = "no_data_source")]
    NoDataSource,
}

impl std::fmt::Display for ResolutionErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionErrorType::Misconfig => "MISCONFIG",
            ResolutionErrorType::RateLimited => "RATE_LIMITED",
            ResolutionErrorType::SourceDown => "SOURCE_DOWN",
            ResolutionErrorType::NoData => "NO_DATA",
            ResolutionErrorType::Blocked => "blocked",
            ResolutionErrorType::NotAvailableInSource => "not_available_in_source",
            ResolutionErrorType::NoDataSource => "no_data_source",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverResult {
    pub success: bool,
    pub series: Option<TimeSeries>,
    pub source_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ResolutionErrorType>,
    pub attempts: Vec<SourceAttempt>,
}

impl ResolverResult {
    fn success(series: TimeSeries, source_used: String, attempts: Vec<SourceAttempt>) -> Self {
        ResolverResult {
            success: true,
            series: Some(series),
            source_used: Some(source_used),
            error: None,
            error_type: None,
            attempts,
        }
    }

    fn failure(error_type: ResolutionErrorType, attempts: Vec<SourceAttempt>) -> Self {
        let error = attempts
            .iter()
            .rev()
            .find_map(|a| a.error.clone())
            .unwrap_or_else(|| error_type.to_string());
        ResolverResult {
            success: false,
            series: None,
            source_used: None,
            error: Some(error),
            error_type: Some(error_type),
            attempts,
        }
    }
}

/// Explicit per-provider kill-switch state, passed in so resolution stays
/// deterministic and testable instead of reading hidden global flags.
#[derive(Debug, Clone, Default)]
pub struct ProviderAvailability {
    enabled: HashSet<String>,
}

impl ProviderAvailability {
    pub fn from_enabled<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProviderAvailability {
            enabled: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }
}

/// Classifies a failed resolution from its attempt list. Decision order
/// matters and is fixed: config problems dominate, then transient quota and
/// outage conditions, then the legitimately-empty outcomes.
pub fn aggregate_error_type(attempts: &[SourceAttempt]) -> ResolutionErrorType {
    if attempts.iter().any(|a| a.reason == REASON_MISCONFIG) {
        return ResolutionErrorType::Misconfig;
    }
    if attempts
        .iter()
        .any(|a| matches!(a.http_status, Some(409) | Some(429)))
    {
        return ResolutionErrorType::RateLimited;
    }
    if attempts
        .iter()
        .any(|a| a.http_status.is_some_and(|s| s >= 500))
    {
        return ResolutionErrorType::SourceDown;
    }
    if attempts.iter().any(|a| a.reason == REASON_NO_DATA) {
        return ResolutionErrorType::NoData;
    }
    if attempts.iter().any(|a| a.http_status == Some(403)) {
        return ResolutionErrorType::Blocked;
    }
    let attempted: Vec<_> = attempts.iter().filter(|a| a.attempted).collect();
    if !attempted.is_empty()
        && attempted
            .iter()
            .all(|a| matches!(a.http_status, Some(400) | Some(404)))
    {
        return ResolutionErrorType::NotAvailableInSource;
    }
    ResolutionErrorType::NoDataSource
}

/// Resolves indicators by walking their configured sources in priority
/// order and returning the first non-empty series.
pub struct SourceResolver {
    providers: HashMap<String, Arc<dyn SeriesProvider>>,
    availability: ProviderAvailability,
    start: Option<NaiveDate>,
}

impl SourceResolver {
    pub fn new(
        providers: Vec<Arc<dyn SeriesProvider>>,
        availability: ProviderAvailability,
        start: Option<NaiveDate>,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        SourceResolver {
            providers,
            availability,
            start,
        }
    }

    #[instrument(name = "Resolve", skip(self, indicator), fields(indicator = %indicator.id))]
    pub async fn resolve(&self, indicator: &IndicatorConfig) -> ResolverResult {
        let mut attempts: Vec<SourceAttempt> = Vec::new();

        for source in &indicator.sources {
            let Some(provider) = self.providers.get(&source.provider) else {
                warn!(provider = %source.provider, "unknown provider in source list");
                attempts.push(SourceAttempt {
                    source: source.provider.clone(),
                    attempted: false,
                    reason: REASON_MISCONFIG.to_string(),
                    error: Some(format!("unknown provider '{}'", source.provider)),
                    http_status: None,
                });
                continue;
            };

            // Identifier shape is checked before any network I/O happens.
            if let Err(msg) = provider.validate_identifier(&source.series_id) {
                warn!(provider = %source.provider, error = %msg, "invalid identifier, skipping source");
                attempts.push(SourceAttempt {
                    source: source.provider.clone(),
                    attempted: false,
                    reason: REASON_MISCONFIG.to_string(),
                    error: Some(msg),
                    http_status: None,
                });
                continue;
            }

            if !self.availability.is_enabled(&source.provider) {
                debug!(provider = %source.provider, "source disabled, skipping");
                attempts.push(SourceAttempt {
                    source: source.provider.clone(),
                    attempted: false,
                    reason: REASON_SOURCE_DISABLED.to_string(),
                    error: None,
                    http_status: None,
                });
                continue;
            }

            match provider
                .fetch_series(&source.series_id, indicator.frequency, self.start)
                .await
            {
                Ok(series) if series.valid_points().is_empty() => {
                    debug!(provider = %source.provider, "source returned an empty series");
                    attempts.push(SourceAttempt {
                        source: source.provider.clone(),
                        attempted: true,
                        reason: REASON_NO_DATA.to_string(),
                        error: Some("returned empty series".to_string()),
                        http_status: None,
                    });
                }
                Ok(mut series) => {
                    attempts.push(SourceAttempt {
                        source: source.provider.clone(),
                        attempted: true,
                        reason: REASON_OK.to_string(),
                        error: None,
                        http_status: None,
                    });
                    series.id = indicator.id.clone();
                    series.name = indicator.name.clone();
                    if let Some(kind) = indicator.transform {
                        debug!(indicator = %indicator.id, transform = ?kind, "deriving transformed series");
                        series = transform::apply_transform(&series, kind);
                    }
                    debug!(
                        provider = %source.provider,
                        points = series.len(),
                        "resolved indicator"
                    );
                    return ResolverResult::success(series, source.provider.clone(), attempts);
                }
                Err(e) => {
                    warn!(provider = %source.provider, error = %e, "source attempt failed");
                    attempts.push(SourceAttempt {
                        source: source.provider.clone(),
                        attempted: true,
                        reason: e.kind.to_string(),
                        error: Some(e.to_string()),
                        http_status: e.status,
                    });
                }
            }
        }

        ResolverResult::failure(aggregate_error_type(&attempts), attempts)
    }
}
