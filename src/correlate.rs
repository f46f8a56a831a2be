//! The `correlate` command: resolve each configured pair and report rolling
//! correlations per named window.

use crate::config::{AppConfig, IndicatorConfig};
use crate::correlation::{self, CorrelationResult};
use crate::resolver::SourceResolver;
use crate::series::TimeSeries;
use crate::ui;
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use tracing::{debug, info, warn};

struct PairRow {
    pair: String,
    window: String,
    result: Option<CorrelationResult>,
    error: Option<String>,
}

fn find_indicator<'a>(config: &'a AppConfig, id: &str) -> Option<&'a IndicatorConfig> {
    config.indicators.iter().find(|i| i.id == id)
}

pub async fn run(config: &AppConfig, resolver: &SourceResolver) -> Result<()> {
    if config.correlations.is_empty() {
        println!("No correlation pairs configured.");
        return Ok(());
    }
    info!("Computing {} correlation pairs...", config.correlations.len());

    let today = Utc::now().date_naive();
    let pb = ui::new_progress_bar(config.correlations.len() as u64, true);
    pb.set_message("correlating");

    let mut rows: Vec<PairRow> = Vec::new();
    for pair in &config.correlations {
        let (Some(asset_cfg), Some(bench_cfg)) = (
            find_indicator(config, &pair.asset),
            find_indicator(config, &pair.benchmark),
        ) else {
            warn!(pair = %pair.name, "pair references an unknown indicator id");
            rows.push(PairRow {
                pair: pair.name.clone(),
                window: "-".to_string(),
                result: None,
                error: Some("unknown indicator id".to_string()),
            });
            pb.inc(1);
            continue;
        };

        let (asset_res, bench_res) =
            tokio::join!(resolver.resolve(asset_cfg), resolver.resolve(bench_cfg));
        pb.inc(1);

        let (Some(asset), Some(benchmark)) = (asset_res.series, bench_res.series) else {
            let error = asset_res
                .error_type
                .or(bench_res.error_type)
                .map(|e| e.to_string())
                .unwrap_or_else(|| "resolution failed".to_string());
            rows.push(PairRow {
                pair: pair.name.clone(),
                window: "-".to_string(),
                result: None,
                error: Some(error),
            });
            continue;
        };

        for window_name in &pair.windows {
            let Some(window) = config.windows.get(window_name) else {
                warn!(window = %window_name, "window is not defined in config");
                rows.push(PairRow {
                    pair: pair.name.clone(),
                    window: window_name.clone(),
                    result: None,
                    error: Some("window not defined".to_string()),
                });
                continue;
            };
            let result = compute_pair(&asset, &benchmark, window.trading_days, window.min_observations, today);
            rows.push(PairRow {
                pair: pair.name.clone(),
                window: window_name.clone(),
                result: Some(result),
                error: None,
            });
        }
    }
    pb.finish_and_clear();

    display_rows(&rows);
    Ok(())
}

fn compute_pair(
    asset: &TimeSeries,
    benchmark: &TimeSeries,
    trading_days: usize,
    min_observations: usize,
    today: chrono::NaiveDate,
) -> CorrelationResult {
    debug!(
        asset = %asset.id,
        benchmark = %benchmark.id,
        trading_days,
        "computing windowed correlation"
    );
    correlation::compute_correlation(asset, benchmark, trading_days, Some(min_observations), today)
}

fn display_rows(rows: &[PairRow]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Window"),
        ui::header_cell("r"),
        ui::header_cell("Obs"),
        ui::header_cell("Asset date"),
        ui::header_cell("Benchmark date"),
    ]);

    for row in rows {
        match (&row.result, &row.error) {
            (Some(result), _) => {
                let r_cell = match result.correlation {
                    Some(r) => ui::correlation_cell(r),
                    None => ui::na_cell(false),
                };
                table.add_row(vec![
                    Cell::new(&row.pair),
                    Cell::new(&row.window),
                    r_cell,
                    Cell::new(result.n_observations.to_string()),
                    ui::format_optional_cell(result.last_asset_date, |d| d.to_string()),
                    ui::format_optional_cell(result.last_base_date, |d| d.to_string()),
                ]);
            }
            (None, error) => {
                let reason = error.as_deref().unwrap_or("failed");
                table.add_row(vec![
                    Cell::new(&row.pair),
                    Cell::new(&row.window),
                    Cell::new(ui::style_text(reason, ui::StyleType::Error)),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                ]);
            }
        }
    }

    println!("{table}");
}
