use crate::correlation::CorrelationWindow;
use crate::series::Frequency;
use crate::transform::TransformKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

/// One provider slot in an indicator's priority-ordered source list.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceRef {
    pub provider: String,
    pub series_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndicatorConfig {
    pub id: String,
    pub name: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub transform: Option<TransformKind>,
    pub sources: Vec<SourceRef>,
}

/// A correlation pair to report on: both sides reference indicator ids.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorrelationPairConfig {
    pub name: String,
    pub asset: String,
    pub benchmark: String,
    #[serde(default = "default_pair_windows")]
    pub windows: Vec<String>,
}

fn default_pair_windows() -> Vec<String> {
    vec!["12m".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_fred_base_url() -> String {
    "https://api.stlouisfed.org".to_string()
}

fn default_dbnomics_base_url() -> String {
    "https://api.db.nomics.world".to_string()
}

fn default_te_base_url() -> String {
    "https://api.tradingeconomics.com".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FredProviderConfig {
    #[serde(default = "default_fred_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbnomicsProviderConfig {
    #[serde(default = "default_dbnomics_base_url")]
    pub base_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TradingEconomicsProviderConfig {
    #[serde(default = "default_te_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fred: Option<FredProviderConfig>,
    pub dbnomics: Option<DbnomicsProviderConfig>,
    pub tradingeconomics: Option<TradingEconomicsProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fred: Some(FredProviderConfig {
                base_url: default_fred_base_url(),
                api_key: String::new(),
                enabled: true,
            }),
            dbnomics: Some(DbnomicsProviderConfig {
                base_url: default_dbnomics_base_url(),
                enabled: true,
            }),
            tradingeconomics: Some(TradingEconomicsProviderConfig {
                base_url: default_te_base_url(),
                api_key: String::new(),
                enabled: true,
            }),
        }
    }
}

/// Fetch/batch tuning. Defaults match the upstream quotas this tool is
/// normally run against.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolutionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_max_concurrency() -> usize {
    4
}
fn default_budget_secs() -> u64 {
    240
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_concurrency: default_max_concurrency(),
            budget_secs: default_budget_secs(),
        }
    }
}

fn default_windows() -> HashMap<String, CorrelationWindow> {
    HashMap::from([
        (
            "12m".to_string(),
            CorrelationWindow {
                trading_days: 252,
                min_observations: 150,
            },
        ),
        (
            "3m".to_string(),
            CorrelationWindow {
                trading_days: 63,
                min_observations: 40,
            },
        ),
    ])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub correlations: Vec<CorrelationPairConfig>,
    #[serde(default = "default_windows")]
    pub windows: HashMap<String, CorrelationWindow>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "macropulse", "macropulse")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
indicators:
  - id: us_cpi
    name: "US CPI (All Urban)"
    frequency: M
    transform: yoy
    sources:
      - provider: fred
        series_id: CPIAUCSL
      - provider: dbnomics
        series_id: BLS/cu/CUSR0000SA0
      - provider: tradingeconomics
        series_id: "united states/consumer price index cpi"
  - id: gold
    name: "Gold (London fix)"
    frequency: D
    sources:
      - provider: fred
        series_id: GOLDAMGBD228NLBM
correlations:
  - name: gold_vs_real_yields
    asset: gold
    benchmark: us_10y_real
    windows: ["12m", "3m"]
providers:
  fred:
    base_url: "http://example.com/fred"
    api_key: "abc123"
  dbnomics:
    base_url: "http://example.com/dbnomics"
    enabled: false
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.indicators.len(), 2);

        let cpi = &config.indicators[0];
        assert_eq!(cpi.id, "us_cpi");
        assert_eq!(cpi.frequency, Frequency::Monthly);
        assert_eq!(cpi.transform, Some(TransformKind::Yoy));
        assert_eq!(cpi.sources.len(), 3);
        assert_eq!(cpi.sources[0].provider, "fred");
        assert_eq!(cpi.sources[1].series_id, "BLS/cu/CUSR0000SA0");

        let gold = &config.indicators[1];
        assert_eq!(gold.frequency, Frequency::Daily);
        assert_eq!(gold.transform, None);

        assert_eq!(config.correlations.len(), 1);
        assert_eq!(config.correlations[0].windows, vec!["12m", "3m"]);

        let fred = config.providers.fred.as_ref().unwrap();
        assert_eq!(fred.api_key, "abc123");
        assert!(fred.enabled);
        let dbnomics = config.providers.dbnomics.as_ref().unwrap();
        assert!(!dbnomics.enabled);
        // Omitted provider sections stay absent; defaults only apply when
        // the whole providers block is missing.
        assert!(config.providers.tradingeconomics.is_none());

        // Named windows fall back to the standard pair.
        assert_eq!(config.windows["12m"].trading_days, 252);
        assert_eq!(config.windows["3m"].min_observations, 40);

        assert_eq!(config.resolution.max_retries, 3);
        assert_eq!(config.resolution.budget_secs, 240);
    }

    #[test]
    fn test_provider_base_url_defaults() {
        let yaml_str = r#"
indicators: []
providers:
  fred:
    api_key: "k"
  tradingeconomics:
    enabled: false
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(
            config.providers.fred.unwrap().base_url,
            "https://api.stlouisfed.org"
        );
        let te = config.providers.tradingeconomics.unwrap();
        assert!(!te.enabled);
        assert_eq!(te.base_url, "https://api.tradingeconomics.com");
    }

    #[test]
    fn test_default_pair_windows() {
        let yaml_str = r#"
indicators: []
correlations:
  - name: pair
    asset: a
    benchmark: b
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.correlations[0].windows, vec!["12m"]);
    }
}
