pub mod config;
pub mod correlate;
pub mod correlation;
pub mod freshness;
pub mod log;
pub mod providers;
pub mod resolve;
pub mod resolver;
pub mod series;
pub mod series_provider;
pub mod transform;
pub mod ui;

use crate::config::AppConfig;
use crate::providers::dbnomics_provider::DbnomicsProvider;
use crate::providers::fred_provider::FredProvider;
use crate::providers::te_provider::TradingEconomicsProvider;
use crate::providers::util::RetryPolicy;
use crate::resolver::{ProviderAvailability, SourceResolver};
use crate::series_provider::SeriesProvider;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub enum AppCommand {
    Resolve,
    Correlate,
    Freshness,
}

/// Builds the resolver from config: one adapter per configured provider
/// section, kill-switch state taken from the `enabled` flags.
pub fn build_resolver(config: &AppConfig) -> Result<SourceResolver> {
    let client = reqwest::Client::builder()
        .user_agent("macropulse/0.2")
        .build()?;
    let policy = RetryPolicy {
        max_retries: config.resolution.max_retries,
        base_delay: Duration::from_millis(config.resolution.base_delay_ms),
    };

    let mut providers: Vec<Arc<dyn SeriesProvider>> = Vec::new();
    let mut enabled: Vec<&'static str> = Vec::new();

    if let Some(fred) = &config.providers.fred {
        providers.push(Arc::new(FredProvider::new(
            &fred.base_url,
            &fred.api_key,
            client.clone(),
            policy.clone(),
        )));
        if fred.enabled {
            enabled.push(providers::fred_provider::SOURCE_NAME);
        }
    }
    if let Some(dbnomics) = &config.providers.dbnomics {
        providers.push(Arc::new(DbnomicsProvider::new(
            &dbnomics.base_url,
            client.clone(),
            policy.clone(),
        )));
        if dbnomics.enabled {
            enabled.push(providers::dbnomics_provider::SOURCE_NAME);
        }
    }
    if let Some(te) = &config.providers.tradingeconomics {
        providers.push(Arc::new(TradingEconomicsProvider::new(
            &te.base_url,
            &te.api_key,
            client.clone(),
            policy.clone(),
        )));
        if te.enabled {
            enabled.push(providers::te_provider::SOURCE_NAME);
        }
    }

    Ok(SourceResolver::new(
        providers,
        ProviderAvailability::from_enabled(enabled),
        None,
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let resolver = build_resolver(&config)?;

    match command {
        AppCommand::Resolve => resolve::run(&config, &resolver).await,
        AppCommand::Correlate => correlate::run(&config, &resolver).await,
        AppCommand::Freshness => freshness::run(&config, &resolver).await,
    }
}
