use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use nalgebra::DMatrix;
use tracing::info;

use crate::model::Classifier;
use crate::target::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub row: usize,
    pub season: i32,
    pub actual: Outcome,
    pub predicted: Outcome,
}

/// Whether rows whose actual target is `Unknown` count towards accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    #[default]
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub accuracy: f64,
}

/// Season-by-season backtest: every evaluated season is predicted by a model
/// trained only on earlier seasons.
#[derive(Debug, Clone, Copy)]
pub struct WalkForward {
    pub start: usize,
    pub step: usize,
}

impl Default for WalkForward {
    fn default() -> Self {
        Self { start: 2, step: 1 }
    }
}

impl WalkForward {
    pub fn new(start: usize, step: usize) -> Self {
        Self { start, step }
    }

    /// Distinct seasons, ascending, and the ones that get evaluated.
    pub fn evaluated_seasons(&self, seasons: &[i32]) -> Vec<i32> {
        let distinct = distinct_seasons(seasons);
        distinct
            .iter()
            .copied()
            .skip(self.start)
            .step_by(self.step.max(1))
            .collect()
    }

    pub fn run<M: Classifier>(
        &self,
        model: &M,
        x: &DMatrix<f64>,
        targets: &[Outcome],
        seasons: &[i32],
    ) -> Result<Vec<Prediction>> {
        if x.nrows() != targets.len() || x.nrows() != seasons.len() {
            bail!(
                "rows ({}), targets ({}) and seasons ({}) differ",
                x.nrows(),
                targets.len(),
                seasons.len()
            );
        }

        let mut all = Vec::new();
        for season in self.evaluated_seasons(seasons) {
            let train = rows_where(seasons, |s| s < season);
            let test = rows_where(seasons, |s| s == season);

            let mut season_model = model.clone();
            let train_y = train.iter().map(|r| targets[*r]).collect::<Vec<_>>();
            season_model
                .fit(&x.select_rows(&train), &train_y)
                .with_context(|| format!("fit model for season {season}"))?;
            let preds = season_model
                .predict(&x.select_rows(&test))
                .with_context(|| format!("predict season {season}"))?;

            let before = all.len();
            all.extend(test.iter().zip(preds).map(|(row, predicted)| Prediction {
                row: *row,
                season,
                actual: targets[*row],
                predicted,
            }));
            let m = accuracy(&all[before..], UnknownPolicy::Include);
            info!(
                season,
                train_rows = train.len(),
                test_rows = test.len(),
                accuracy = m.accuracy,
                "backtested season"
            );
        }
        Ok(all)
    }
}

pub fn distinct_seasons(seasons: &[i32]) -> Vec<i32> {
    let mut out = seasons.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

fn rows_where(seasons: &[i32], keep: impl Fn(i32) -> bool) -> Vec<usize> {
    seasons
        .iter()
        .enumerate()
        .filter(|(_, s)| keep(**s))
        .map(|(row, _)| row)
        .collect()
}

/// Exact-match fraction; an empty selection scores zero.
pub fn accuracy(predictions: &[Prediction], policy: UnknownPolicy) -> Metrics {
    let mut samples = 0usize;
    let mut correct = 0usize;
    for p in predictions {
        if policy == UnknownPolicy::Exclude && !p.actual.is_known() {
            continue;
        }
        samples += 1;
        if p.actual == p.predicted {
            correct += 1;
        }
    }
    Metrics {
        samples,
        accuracy: if samples == 0 {
            0.0
        } else {
            correct as f64 / samples as f64
        },
    }
}

pub fn accuracy_by_season(
    predictions: &[Prediction],
    policy: UnknownPolicy,
) -> BTreeMap<i32, Metrics> {
    let mut grouped: BTreeMap<i32, Vec<Prediction>> = BTreeMap::new();
    for p in predictions {
        grouped.entry(p.season).or_default().push(*p);
    }
    grouped
        .into_iter()
        .map(|(season, preds)| (season, accuracy(&preds, policy)))
        .collect()
}
