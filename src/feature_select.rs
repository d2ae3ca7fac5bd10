use std::ops::Range;

use anyhow::{Result, bail};
use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::games_dataset::GameTable;
use crate::model::Classifier;
use crate::target::Outcome;

/// Columns never offered to the selector.
pub const EXCLUDED_COLUMNS: [&str; 6] = ["season", "date", "won", "target", "team", "team_opp"];

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub data: DMatrix<f64>,
}

impl FeatureMatrix {
    /// Candidate columns of `table`. A column with any missing cell cannot feed
    /// a linear model and is left out.
    pub fn from_table(table: &GameTable) -> Self {
        let mut keep = Vec::new();
        let mut dropped = Vec::new();
        for (col, name) in table.feature_names.iter().enumerate() {
            if EXCLUDED_COLUMNS.contains(&name.as_str()) {
                continue;
            }
            if table.features.iter().all(|row| row[col].is_some()) {
                keep.push(col);
            } else {
                dropped.push(name.as_str());
            }
        }
        if !dropped.is_empty() {
            warn!(count = dropped.len(), columns = ?dropped, "dropping columns with missing values");
        }

        let data = DMatrix::from_fn(table.len(), keep.len(), |row, col| {
            table.features[row][keep[col]].unwrap_or_default()
        });
        Self {
            names: keep
                .iter()
                .map(|c| table.feature_names[*c].clone())
                .collect(),
            data,
        }
    }

    pub fn select(&self, names: &[String]) -> Result<DMatrix<f64>> {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            let Some(idx) = self.names.iter().position(|n| n == name) else {
                bail!("unknown feature column `{name}`");
            };
            cols.push(idx);
        }
        Ok(self.data.select_columns(&cols))
    }
}

/// Per-column rescaling to [0, 1] from the observed min and max.
#[derive(Debug, Clone, Default)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    scales: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(data: &DMatrix<f64>) -> Self {
        let mut mins = Vec::with_capacity(data.ncols());
        let mut scales = Vec::with_capacity(data.ncols());
        for col in data.column_iter() {
            let min = col.iter().copied().fold(f64::INFINITY, f64::min);
            let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            mins.push(if min.is_finite() { min } else { 0.0 });
            // Constant columns map to 0.
            scales.push(if range > 0.0 { 1.0 / range } else { 1.0 });
        }
        Self { mins, scales }
    }

    pub fn transform(&self, data: &mut DMatrix<f64>) {
        for (j, mut col) in data.column_iter_mut().enumerate() {
            let (min, scale) = (self.mins[j], self.scales[j]);
            for v in col.iter_mut() {
                *v = (*v - min) * scale;
            }
        }
    }
}

/// Expanding-window folds: each test block follows all of its training rows.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSplit {
    pub n_splits: usize,
}

impl TimeSeriesSplit {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<(Range<usize>, Range<usize>)>> {
        let n_folds = self.n_splits + 1;
        if self.n_splits == 0 {
            bail!("time series split needs at least one split");
        }
        if n_folds > n_samples {
            bail!("cannot make {n_folds} folds out of {n_samples} rows");
        }
        let test_size = n_samples / n_folds;
        let first_test = n_samples - self.n_splits * test_size;
        Ok((0..self.n_splits)
            .map(|k| {
                let start = first_test + k * test_size;
                (0..start, start..start + test_size)
            })
            .collect())
    }
}

/// Greedy forward selection scored by mean fold accuracy.
#[derive(Debug, Clone, Copy)]
pub struct SequentialFeatureSelector {
    pub n_features: usize,
    pub cv: TimeSeriesSplit,
}

impl SequentialFeatureSelector {
    pub fn new(n_features: usize, cv: TimeSeriesSplit) -> Self {
        Self { n_features, cv }
    }

    /// Chosen column positions, ascending.
    pub fn fit<M: Classifier>(
        &self,
        model: &M,
        x: &DMatrix<f64>,
        y: &[Outcome],
    ) -> Result<Vec<usize>> {
        let available = x.ncols();
        if self.n_features == 0 || self.n_features >= available {
            bail!(
                "cannot select {} features out of {available}",
                self.n_features
            );
        }
        if x.nrows() != y.len() {
            bail!("feature rows ({}) and labels ({}) differ", x.nrows(), y.len());
        }
        let folds = self.cv.split(x.nrows())?;

        let mut selected: Vec<usize> = Vec::with_capacity(self.n_features);
        let mut remaining: Vec<usize> = (0..available).collect();

        for round in 0..self.n_features {
            let scored = remaining
                .par_iter()
                .map(|candidate| {
                    let mut cols = selected.clone();
                    cols.push(*candidate);
                    cross_val_accuracy(model, x, y, &cols, &folds).map(|s| (*candidate, s))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut best = scored[0];
            for item in &scored[1..] {
                if item.1 > best.1 {
                    best = *item;
                }
            }
            debug!(round, column = best.0, score = best.1, "selected feature");
            selected.push(best.0);
            remaining.retain(|c| *c != best.0);
        }

        selected.sort_unstable();
        Ok(selected)
    }
}

pub fn cross_val_accuracy<M: Classifier>(
    model: &M,
    x: &DMatrix<f64>,
    y: &[Outcome],
    cols: &[usize],
    folds: &[(Range<usize>, Range<usize>)],
) -> Result<f64> {
    let sub = x.select_columns(cols);
    let mut total = 0.0;
    for (train, test) in folds {
        let mut fold_model = model.clone();
        let train_x = sub.rows(train.start, train.len()).clone_owned();
        fold_model.fit(&train_x, &y[train.clone()])?;
        let test_x = sub.rows(test.start, test.len()).clone_owned();
        let preds = fold_model.predict(&test_x)?;
        total += exact_match(&preds, &y[test.clone()]);
    }
    Ok(total / folds.len().max(1) as f64)
}

fn exact_match(pred: &[Outcome], actual: &[Outcome]) -> f64 {
    if pred.is_empty() {
        return 0.0;
    }
    let hits = pred.iter().zip(actual).filter(|(p, a)| p == a).count();
    hits as f64 / pred.len() as f64
}

/// Scales `features` in place over every row, then selects predictors.
/// The scaling sees all seasons, including those later used as test data.
pub fn select_predictors<M: Classifier>(
    model: &M,
    features: &mut FeatureMatrix,
    targets: &[Outcome],
    n_features: usize,
    cv_splits: usize,
) -> Result<Vec<String>> {
    let scaler = MinMaxScaler::fit(&features.data);
    scaler.transform(&mut features.data);

    let selector = SequentialFeatureSelector::new(n_features, TimeSeriesSplit::new(cv_splits));
    let chosen = selector.fit(model, &features.data, targets)?;
    let names = chosen
        .iter()
        .map(|c| features.names[*c].clone())
        .collect::<Vec<_>>();
    info!(predictors = ?names, "feature selection complete");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RidgeClassifier;

    #[test]
    fn time_series_split_matches_expanding_windows() {
        let folds = TimeSeriesSplit::new(3).split(10).expect("folds");
        assert_eq!(
            folds,
            vec![(0..4, 4..6), (0..6, 6..8), (0..8, 8..10)]
        );
        assert!(TimeSeriesSplit::new(3).split(3).is_err());
    }

    #[test]
    fn scaler_maps_to_unit_range() {
        let mut m = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 3.0, 5.0, 2.0, 5.0]);
        let scaler = MinMaxScaler::fit(&m);
        scaler.transform(&mut m);
        assert_eq!(m.column(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 0.5]);
        assert!(m.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn selector_prefers_informative_column() {
        let n = 40;
        let y = (0..n)
            .map(|i| if i % 2 == 0 { Outcome::Won } else { Outcome::Lost })
            .collect::<Vec<_>>();
        let x = DMatrix::from_fn(n, 3, |row, col| match col {
            0 => ((row * 7) % 5) as f64,
            1 => if row % 2 == 0 { 1.0 } else { 0.0 },
            _ => ((row * 3) % 4) as f64,
        });
        let selector = SequentialFeatureSelector::new(1, TimeSeriesSplit::new(3));
        let chosen = selector
            .fit(&RidgeClassifier::new(1.0), &x, &y)
            .expect("selection");
        assert_eq!(chosen, vec![1]);
    }

    #[test]
    fn selecting_every_column_is_rejected() {
        let x = DMatrix::zeros(8, 2);
        let y = vec![Outcome::Won; 8];
        let selector = SequentialFeatureSelector::new(2, TimeSeriesSplit::new(3));
        assert!(selector.fit(&RidgeClassifier::default(), &x, &y).is_err());
    }
}
