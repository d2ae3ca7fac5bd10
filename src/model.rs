use anyhow::{Result, anyhow, bail};
use nalgebra::{DMatrix, DVector};

use crate::target::Outcome;

/// Fit/predict contract the selector and backtester drive. Implementations
/// are cloned to get an unfitted copy per fold.
pub trait Classifier: Clone + Send + Sync {
    fn fit(&mut self, x: &DMatrix<f64>, y: &[Outcome]) -> Result<()>;
    fn predict(&self, x: &DMatrix<f64>) -> Result<Vec<Outcome>>;
}

/// Least-squares classifier with an L2 penalty, one-vs-all on {-1, +1}
/// indicator targets. Two classes share a single decision column.
#[derive(Debug, Clone)]
pub struct RidgeClassifier {
    pub alpha: f64,
    classes: Vec<Outcome>,
    coef: Option<DMatrix<f64>>,
    intercept: Option<DVector<f64>>,
}

impl Default for RidgeClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeClassifier {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            classes: Vec::new(),
            coef: None,
            intercept: None,
        }
    }

    pub fn classes(&self) -> &[Outcome] {
        &self.classes
    }

    fn decision_columns(&self) -> usize {
        if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        }
    }

    fn encode(&self, y: &[Outcome]) -> DMatrix<f64> {
        let k = self.decision_columns();
        DMatrix::from_fn(y.len(), k, |row, col| {
            let positive = if k == 1 {
                self.classes[1]
            } else {
                self.classes[col]
            };
            if y[row] == positive { 1.0 } else { -1.0 }
        })
    }
}

impl Classifier for RidgeClassifier {
    fn fit(&mut self, x: &DMatrix<f64>, y: &[Outcome]) -> Result<()> {
        let (n, p) = x.shape();
        if n != y.len() {
            bail!("feature rows ({n}) and labels ({}) differ", y.len());
        }
        if n == 0 || p == 0 {
            bail!("cannot fit ridge classifier on a {n}x{p} matrix");
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            bail!(
                "ridge classifier needs at least two classes, training data has {:?}",
                classes
            );
        }
        self.classes = classes;

        let targets = self.encode(y);
        let (xc, x_mean) = center_columns(x);
        let (yc, y_mean) = center_columns(&targets);

        let gram = xc.transpose() * &xc + DMatrix::<f64>::identity(p, p) * self.alpha;
        let rhs = xc.transpose() * &yc;
        let chol = gram
            .cholesky()
            .ok_or_else(|| anyhow!("ridge system is singular (alpha = {})", self.alpha))?;
        let coef = chol.solve(&rhs);

        let intercept = DVector::from_iterator(
            coef.ncols(),
            (0..coef.ncols()).map(|k| y_mean[k] - x_mean.dot(&coef.column(k))),
        );

        self.coef = Some(coef);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict(&self, x: &DMatrix<f64>) -> Result<Vec<Outcome>> {
        let (Some(coef), Some(intercept)) = (&self.coef, &self.intercept) else {
            bail!("ridge classifier used before fit");
        };
        if x.ncols() != coef.nrows() {
            bail!(
                "model was fit on {} features, got {}",
                coef.nrows(),
                x.ncols()
            );
        }

        let scores = x * coef;
        let out = (0..scores.nrows())
            .map(|row| {
                if coef.ncols() == 1 {
                    if scores[(row, 0)] + intercept[0] > 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                } else {
                    let mut best = 0usize;
                    let mut best_score = f64::NEG_INFINITY;
                    for k in 0..coef.ncols() {
                        let s = scores[(row, k)] + intercept[k];
                        if s > best_score {
                            best_score = s;
                            best = k;
                        }
                    }
                    self.classes[best]
                }
            })
            .collect();
        Ok(out)
    }
}

fn center_columns(m: &DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let n = m.nrows().max(1) as f64;
    let means = DVector::from_iterator(m.ncols(), m.column_iter().map(|c| c.sum() / n));
    let mut centered = m.clone();
    for (j, mut col) in centered.column_iter_mut().enumerate() {
        col.add_scalar_mut(-means[j]);
    }
    (centered, means)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_binary_classes() {
        let x = DMatrix::from_row_slice(6, 1, &[0.0, 0.1, 0.2, 0.8, 0.9, 1.0]);
        let y = [
            Outcome::Lost,
            Outcome::Lost,
            Outcome::Lost,
            Outcome::Won,
            Outcome::Won,
            Outcome::Won,
        ];
        let mut model = RidgeClassifier::new(0.01);
        model.fit(&x, &y).expect("fit");
        assert_eq!(model.predict(&x).expect("predict"), y.to_vec());
    }

    #[test]
    fn handles_three_classes() {
        let x = DMatrix::from_row_slice(
            6,
            2,
            &[1.0, 0.0, 0.9, 0.1, 0.0, 1.0, 0.1, 0.9, 0.0, 0.0, 0.05, 0.05],
        );
        let y = [
            Outcome::Lost,
            Outcome::Lost,
            Outcome::Won,
            Outcome::Won,
            Outcome::Unknown,
            Outcome::Unknown,
        ];
        let mut model = RidgeClassifier::new(0.001);
        model.fit(&x, &y).expect("fit");
        assert_eq!(
            model.classes(),
            [Outcome::Lost, Outcome::Won, Outcome::Unknown]
        );
        assert_eq!(model.predict(&x).expect("predict"), y.to_vec());
    }

    #[test]
    fn single_class_is_an_error() {
        let x = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let mut model = RidgeClassifier::default();
        assert!(model.fit(&x, &[Outcome::Won, Outcome::Won]).is_err());
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let model = RidgeClassifier::default();
        assert!(model.predict(&DMatrix::zeros(1, 1)).is_err());
    }
}
