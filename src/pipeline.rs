use std::collections::BTreeMap;

use anyhow::{Result, bail};
use tracing::info;

use crate::backtest::{self, Metrics, Prediction, WalkForward};
use crate::config::PipelineConfig;
use crate::feature_select::{FeatureMatrix, select_predictors};
use crate::games_dataset::{self, BuildSummary, GameTable};
use crate::model::{Classifier, RidgeClassifier};
use crate::target::next_game_targets;

#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub predictors: Vec<String>,
    pub predictions: Vec<Prediction>,
    pub overall: Metrics,
    pub by_season: BTreeMap<i32, Metrics>,
}

/// Parses every page under the scores directory and persists the dataset
/// plus a JSON report of skipped pages.
pub fn build(cfg: &PipelineConfig) -> Result<BuildSummary> {
    let (dataset, summary) =
        games_dataset::build_dataset(&cfg.scores_dir, cfg.parse_parallelism)?;
    games_dataset::write_csv(&cfg.dataset_path, &dataset)?;
    games_dataset::write_report(&games_dataset::report_path(&cfg.dataset_path), &summary)?;
    info!(
        pages = summary.pages_total,
        parsed = summary.pages_parsed,
        rows = summary.rows,
        path = %cfg.dataset_path.display(),
        "dataset written"
    );
    Ok(summary)
}

pub fn predict(cfg: &PipelineConfig) -> Result<PredictionReport> {
    let table = games_dataset::read_csv(&cfg.dataset_path)?;
    predict_table(table, &RidgeClassifier::new(cfg.alpha), cfg)
}

/// Labels, scales, selects predictors and backtests one loaded dataset.
pub fn predict_table<M: Classifier>(
    mut table: GameTable,
    model: &M,
    cfg: &PipelineConfig,
) -> Result<PredictionReport> {
    if table.is_empty() {
        bail!("dataset has no rows");
    }
    table.sort_by_date();
    let targets = next_game_targets(&table.games);

    let mut features = FeatureMatrix::from_table(&table);
    let predictors =
        select_predictors(model, &mut features, &targets, cfg.n_features, cfg.cv_splits)?;
    let x = features.select(&predictors)?;

    let seasons = table.games.iter().map(|g| g.season).collect::<Vec<_>>();
    let predictions = WalkForward::new(cfg.start, cfg.step).run(model, &x, &targets, &seasons)?;

    Ok(PredictionReport {
        overall: backtest::accuracy(&predictions, cfg.unknown_policy),
        by_season: backtest::accuracy_by_season(&predictions, cfg.unknown_policy),
        predictors,
        predictions,
    })
}
