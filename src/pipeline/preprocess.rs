//! Per-fold preprocessing: standardization and univariate feature selection.
//!
//! Both transforms are fitted on training rows only and then applied, never
//! refitted, to the held-out rows. The LOSO validator constructs fresh
//! instances per fold so no fitted state leaks across folds.

use ndarray::{Array1, Array2, Axis};

use crate::pipeline::spectrum::POWER_EPSILON;

/// Zero-mean, unit-variance scaling per column.
#[derive(Clone, Debug)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let mut std = x.std_axis(Axis(0), 0.0);
        // Constant columns scale by 1 so transforms stay finite.
        std.mapv_inplace(|s| if s > 0.0 { s } else { 1.0 });
        Self { mean, std }
    }

    pub fn fit_transform(x: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let transformed = scaler.transform(x);
        (scaler, transformed)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.std
    }
}

/// Keep the top-k columns by one-way ANOVA F score between the two classes.
///
/// Selected columns are kept in ascending index order, so the surviving
/// column order matches the original feature order.
#[derive(Clone, Debug)]
pub struct SelectKBest {
    indices: Vec<usize>,
}

impl SelectKBest {
    pub fn fit(x: &Array2<f64>, y: &[u8], k: usize) -> Self {
        let k = k.min(x.ncols()).max(1);
        let scores = anova_f_scores(x, y);
        let mut ranked: Vec<usize> = (0..x.ncols()).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let mut indices: Vec<usize> = ranked.into_iter().take(k).collect();
        indices.sort_unstable();
        Self { indices }
    }

    pub fn fit_transform(x: &Array2<f64>, y: &[u8], k: usize) -> (Self, Array2<f64>) {
        let selector = Self::fit(x, y, k);
        let transformed = selector.transform(x);
        (selector, transformed)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        x.select(Axis(1), &self.indices)
    }

    pub fn selected(&self) -> &[usize] {
        &self.indices
    }
}

/// One-way F statistic per column for a binary labeling: between-group mean
/// square over within-group mean square. Constant columns score 0 via the
/// epsilon guard rather than NaN.
fn anova_f_scores(x: &Array2<f64>, y: &[u8]) -> Vec<f64> {
    let n = x.nrows() as f64;
    let n0 = y.iter().filter(|&&label| label == 0).count() as f64;
    let n1 = n - n0;
    if n0 == 0.0 || n1 == 0.0 || n < 3.0 {
        return vec![0.0; x.ncols()];
    }

    (0..x.ncols())
        .map(|col| {
            let column = x.column(col);
            let grand_mean = column.sum() / n;
            let (mut sum0, mut sum1) = (0.0, 0.0);
            for (&value, &label) in column.iter().zip(y) {
                if label == 0 {
                    sum0 += value;
                } else {
                    sum1 += value;
                }
            }
            let (mean0, mean1) = (sum0 / n0, sum1 / n1);

            let ss_between = n0 * (mean0 - grand_mean).powi(2) + n1 * (mean1 - grand_mean).powi(2);
            let mut ss_within = 0.0;
            for (&value, &label) in column.iter().zip(y) {
                let group_mean = if label == 0 { mean0 } else { mean1 };
                ss_within += (value - group_mean).powi(2);
            }

            let ms_between = ss_between; // one degree of freedom between two groups
            let ms_within = ss_within / (n - 2.0);
            ms_between / (ms_within + POWER_EPSILON)
        })
        .collect()
}
