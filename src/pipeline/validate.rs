//! Leave-one-subject-out validation.
//!
//! Each fold holds out every window of one subject, fits a fresh scaler,
//! optional feature selector and classifier on the remaining subjects only,
//! and evaluates on the held-out windows. No fitted state survives a fold.

use log::{debug, info};
use ndarray::Axis;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::pipeline::dataset::Dataset;
use crate::pipeline::mlp::MlpClassifier;
use crate::pipeline::preprocess::{SelectKBest, StandardScaler};

/// Outcome of one fold. Confusion matrix rows are actual [relax, focus],
/// columns are predicted [relax, focus].
#[derive(Clone, Debug, Serialize)]
pub struct FoldResult {
    pub subject: String,
    pub accuracy: f64,
    pub confusion: [[u64; 2]; 2],
    pub loss_curve: Vec<f64>,
}

impl FoldResult {
    pub fn n_test_windows(&self) -> u64 {
        self.confusion.iter().flatten().sum()
    }
}

/// Aggregate over all folds, in sorted held-out-subject order.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationSummary {
    pub folds: Vec<FoldResult>,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub total_confusion: [[u64; 2]; 2],
    pub relax_recall: f64,
    pub focus_recall: f64,
    pub relax_precision: f64,
    pub focus_precision: f64,
}

/// Row indices for one fold: all rows of other subjects train, the held-out
/// subject's rows test.
fn fold_indices(subjects: &[String], held_out: &str) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (row, subject) in subjects.iter().enumerate() {
        if subject == held_out {
            test.push(row);
        } else {
            train.push(row);
        }
    }
    (train, test)
}

/// Run the full LOSO loop over a dataset.
pub fn run_loso(dataset: &Dataset, config: &PipelineConfig) -> ValidationSummary {
    let mut folds = Vec::new();
    for subject in dataset.unique_subjects() {
        let fold = run_fold(dataset, config, &subject);
        info!(
            "{subject}: accuracy = {:.3} over {} test windows",
            fold.accuracy,
            fold.n_test_windows()
        );
        folds.push(fold);
    }
    aggregate(folds)
}

fn run_fold(dataset: &Dataset, config: &PipelineConfig, held_out: &str) -> FoldResult {
    let (train_idx, test_idx) = fold_indices(&dataset.subjects, held_out);
    debug_assert!(train_idx.iter().all(|&i| dataset.subjects[i] != held_out));
    debug_assert!(test_idx.iter().all(|&i| dataset.subjects[i] == held_out));
    debug_assert_eq!(train_idx.len() + test_idx.len(), dataset.n_rows());

    let train_x = dataset.x.select(Axis(0), &train_idx);
    let test_x = dataset.x.select(Axis(0), &test_idx);
    let train_y: Vec<u8> = train_idx.iter().map(|&i| dataset.y[i]).collect();
    let test_y: Vec<u8> = test_idx.iter().map(|&i| dataset.y[i]).collect();

    // Scaler and selector are fitted on training rows only; test rows are
    // transformed through the already-fitted state, never refitted.
    let (scaler, train_x) = StandardScaler::fit_transform(&train_x);
    let test_x = scaler.transform(&test_x);
    let (train_x, test_x) = match config.feature_selection {
        Some(k) => {
            let k = k.min(train_x.ncols());
            let (selector, train_x) = SelectKBest::fit_transform(&train_x, &train_y, k);
            debug!("{held_out}: selected columns {:?}", selector.selected());
            let test_x = selector.transform(&test_x);
            (train_x, test_x)
        }
        None => (train_x, test_x),
    };

    let mut classifier = MlpClassifier::new(config.mlp.clone(), config.seed);
    classifier.fit(&train_x, &train_y);
    let predictions = classifier.predict(&test_x);

    let mut confusion = [[0u64; 2]; 2];
    for (&predicted, &actual) in predictions.iter().zip(&test_y) {
        confusion[actual as usize][predicted as usize] += 1;
    }
    let correct = predictions
        .iter()
        .zip(&test_y)
        .filter(|(p, t)| p == t)
        .count();
    FoldResult {
        subject: held_out.to_string(),
        accuracy: correct as f64 / test_y.len().max(1) as f64,
        confusion,
        loss_curve: classifier.loss_curve().to_vec(),
    }
}

fn aggregate(folds: Vec<FoldResult>) -> ValidationSummary {
    let n = folds.len().max(1) as f64;
    let mean_accuracy = folds.iter().map(|f| f.accuracy).sum::<f64>() / n;
    let std_accuracy = (folds
        .iter()
        .map(|f| (f.accuracy - mean_accuracy).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let mut total = [[0u64; 2]; 2];
    for fold in &folds {
        for row in 0..2 {
            for col in 0..2 {
                total[row][col] += fold.confusion[row][col];
            }
        }
    }

    let ratio = |numerator: u64, denominator: u64| {
        if denominator == 0 {
            0.0
        } else {
            numerator as f64 / denominator as f64
        }
    };
    ValidationSummary {
        mean_accuracy,
        std_accuracy,
        relax_recall: ratio(total[0][0], total[0][0] + total[0][1]),
        focus_recall: ratio(total[1][1], total[1][0] + total[1][1]),
        relax_precision: ratio(total[0][0], total[0][0] + total[1][0]),
        focus_precision: ratio(total[1][1], total[0][1] + total[1][1]),
        total_confusion: total,
        folds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MlpConfig;
    use crate::pipeline::features::FeatureProfile;
    use ndarray::Array2;

    /// Synthetic dataset: feature 0 separates the classes cleanly for every
    /// subject, feature 1 is structured noise.
    fn synthetic_dataset(subject_ids: &[&str], windows_per_state: usize) -> Dataset {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        let mut subjects = Vec::new();
        for (s, id) in subject_ids.iter().enumerate() {
            for label in [0u8, 1u8] {
                for w in 0..windows_per_state {
                    let jitter = ((s * 17 + w * 5) % 9) as f64 * 0.02;
                    rows.push(vec![
                        f64::from(label) * 3.0 + jitter,
                        ((w * 7 + s) % 5) as f64 * 0.1,
                    ]);
                    y.push(label);
                    subjects.push((*id).to_string());
                }
            }
        }
        let dim = rows[0].len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Dataset {
            x: Array2::from_shape_vec((flat.len() / dim, dim), flat).unwrap(),
            y,
            subjects,
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            feature_profile: FeatureProfile::Engineered,
            feature_selection: Some(2),
            mlp: MlpConfig {
                hidden_layers: vec![8],
                max_epochs: 60,
                learning_rate: 1e-2,
                alpha: 1e-4,
                batch_size: 8,
                early_stopping: false,
                validation_fraction: 0.1,
                patience: 5,
            },
            ..Default::default()
        }
    }

    #[test]
    fn fold_masks_are_disjoint_and_exhaustive() {
        let dataset = synthetic_dataset(&["S01", "S02", "S03"], 4);
        for held_out in dataset.unique_subjects() {
            let (train, test) = fold_indices(&dataset.subjects, &held_out);
            assert_eq!(train.len() + test.len(), dataset.n_rows());
            assert!(train.iter().all(|&i| dataset.subjects[i] != held_out));
            assert!(test.iter().all(|&i| dataset.subjects[i] == held_out));
            assert!(!test.is_empty());
        }
    }

    #[test]
    fn loso_runs_one_fold_per_subject_in_sorted_order() {
        let dataset = synthetic_dataset(&["S03", "S01", "S02"], 4);
        let summary = run_loso(&dataset, &fast_config());
        let order: Vec<&str> = summary.folds.iter().map(|f| f.subject.as_str()).collect();
        assert_eq!(order, vec!["S01", "S02", "S03"]);
    }

    #[test]
    fn confusion_sums_match_window_counts() {
        let dataset = synthetic_dataset(&["S01", "S02", "S03"], 5);
        let summary = run_loso(&dataset, &fast_config());
        for fold in &summary.folds {
            // Each fold tests exactly one subject's windows: 2 states x 5.
            assert_eq!(fold.n_test_windows(), 10);
            for row in 0..2 {
                let row_sum: u64 = fold.confusion[row].iter().sum();
                assert_eq!(row_sum, 5);
            }
        }
        let grand_total: u64 = summary.total_confusion.iter().flatten().sum();
        assert_eq!(grand_total, dataset.n_rows() as u64);
    }

    #[test]
    fn separable_subjects_classified_well() {
        let dataset = synthetic_dataset(&["S01", "S02", "S03", "S04"], 8);
        let summary = run_loso(&dataset, &fast_config());
        assert!(
            summary.mean_accuracy > 0.9,
            "mean accuracy {}",
            summary.mean_accuracy
        );
        assert!(summary.relax_recall > 0.8);
        assert!(summary.focus_recall > 0.8);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dataset = synthetic_dataset(&["S01", "S02"], 6);
        let config = fast_config();
        let first = run_loso(&dataset, &config);
        let second = run_loso(&dataset, &config);
        for (a, b) in first.folds.iter().zip(&second.folds) {
            assert_eq!(a.confusion, b.confusion);
            assert_eq!(a.accuracy, b.accuracy);
        }
    }

    #[test]
    fn empty_denominators_report_zero() {
        // Single relax-only outcome: focus precision/recall must be 0, not NaN.
        let folds = vec![FoldResult {
            subject: "S01".into(),
            accuracy: 1.0,
            confusion: [[4, 0], [0, 0]],
            loss_curve: Vec::new(),
        }];
        let summary = aggregate(folds);
        assert_eq!(summary.focus_recall, 0.0);
        assert_eq!(summary.focus_precision, 0.0);
        assert_eq!(summary.relax_recall, 1.0);
    }
}
