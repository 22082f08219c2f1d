//! Dataset assembly: subject discovery, recording loading, window labeling.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::pipeline::error::PipelineError;
use crate::pipeline::features::FeatureExtractor;
use crate::pipeline::segment::segment;

/// Label value for relax-state windows.
pub const LABEL_RELAX: u8 = 0;
/// Label value for focus-state windows.
pub const LABEL_FOCUS: u8 = 1;

const RELAX_FILE: &str = "1.txt";
const FOCUS_FILE: &str = "2.txt";

/// Global feature matrix with row-parallel labels and subject ids.
///
/// Row `i`'s label and subject are fixed at assembly time; rows are never
/// reordered independently of each other.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Vec<u8>,
    pub subjects: Vec<String>,
}

impl Dataset {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn feature_dim(&self) -> usize {
        self.x.ncols()
    }

    /// Distinct subject ids in sorted order; the LOSO fold order.
    pub fn unique_subjects(&self) -> Vec<String> {
        let mut unique: Vec<String> = self.subjects.clone();
        unique.sort();
        unique.dedup();
        unique
    }
}

/// Walk the dataset root, window and featurize both recordings of every
/// subject, and concatenate everything into one global matrix.
///
/// Per-subject problems (unreadable files, recordings too short to window)
/// are logged and skipped; the run only fails when the root is unusable or
/// every subject was skipped.
pub fn assemble(config: &PipelineConfig) -> Result<Dataset, PipelineError> {
    let subject_dirs = discover_subjects(&config.dataset_root)?;
    let extractor = FeatureExtractor::new(config.feature_profile, config.sampling_rate_hz);
    let window_len = config.window_len();
    let stride = config.stride();

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut y: Vec<u8> = Vec::new();
    let mut subjects: Vec<String> = Vec::new();

    for dir in &subject_dirs {
        let subject_id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let relax = match load_recording(&dir.join(RELAX_FILE)) {
            Ok(samples) => samples,
            Err(err) => {
                warn!("{subject_id}: skipping, relax recording unusable: {err}");
                continue;
            }
        };
        let focus = match load_recording(&dir.join(FOCUS_FILE)) {
            Ok(samples) => samples,
            Err(err) => {
                warn!("{subject_id}: skipping, focus recording unusable: {err}");
                continue;
            }
        };

        let relax_windows = trimmed_windows(&relax, window_len, stride, config);
        let focus_windows = trimmed_windows(&focus, window_len, stride, config);
        if relax_windows.is_empty() || focus_windows.is_empty() {
            warn!("{subject_id}: skipping, not enough data for one window per state");
            continue;
        }
        debug!(
            "{subject_id}: {} relax windows, {} focus windows",
            relax_windows.len(),
            focus_windows.len()
        );

        for (windows, label) in [(relax_windows, LABEL_RELAX), (focus_windows, LABEL_FOCUS)] {
            for window in windows {
                rows.push(extractor.extract(&window));
                y.push(label);
                subjects.push(subject_id.clone());
            }
        }
    }

    if rows.is_empty() {
        return Err(PipelineError::NoValidData);
    }

    let dim = rows[0].len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let x = Array2::from_shape_vec((flat.len() / dim, dim), flat)
        .expect("feature rows have a constant dimension");

    assert_eq!(x.nrows(), y.len());
    assert_eq!(y.len(), subjects.len());
    info!(
        "assembled {} windows x {} features from {} subjects",
        x.nrows(),
        dim,
        {
            let mut ids = subjects.clone();
            ids.sort();
            ids.dedup();
            ids.len()
        }
    );
    Ok(Dataset { x, y, subjects })
}

/// Subject directories: immediate subdirectories of the root whose names
/// start with `S`, sorted by name for reproducible row order.
fn discover_subjects(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::DatasetRootMissing {
            path: root.to_path_buf(),
        });
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('S'))
                    .unwrap_or(false)
        })
        .collect();
    if dirs.is_empty() {
        return Err(PipelineError::NoSubjects {
            path: root.to_path_buf(),
        });
    }
    dirs.sort();
    Ok(dirs)
}

/// One recording: whitespace/newline-delimited real numbers, one per sample.
fn load_recording(path: &Path) -> Result<Vec<f64>, PipelineError> {
    let text = fs::read_to_string(path)?;
    let mut samples = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| PipelineError::MalformedSample {
                path: path.to_path_buf(),
                line: line_idx + 1,
            })?;
            samples.push(value);
        }
    }
    Ok(samples)
}

fn trimmed_windows(
    signal: &[f64],
    window_len: usize,
    stride: usize,
    config: &PipelineConfig,
) -> Vec<Vec<f64>> {
    let mut windows = segment(signal, window_len, stride);
    let trim = config.window_trim;
    if trim.leading + trim.trailing >= windows.len() {
        if trim.leading + trim.trailing > 0 {
            return Vec::new();
        }
        return windows;
    }
    windows.drain(..trim.leading);
    windows.truncate(windows.len() - trim.trailing);
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowTrim;
    use crate::pipeline::features::FeatureProfile;
    use std::io::Write;

    fn write_recording(path: &Path, samples: &[f64]) {
        let mut file = fs::File::create(path).unwrap();
        for chunk in samples.chunks(10) {
            let line: Vec<String> = chunk.iter().map(|s| format!("{s:.6}")).collect();
            writeln!(file, "{}", line.join(" ")).unwrap();
        }
    }

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn test_config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            dataset_root: root.to_path_buf(),
            sampling_rate_hz: 100.0,
            segment_seconds: 1.0,
            overlap_ratio: 0.5,
            feature_profile: FeatureProfile::Engineered,
            ..Default::default()
        }
    }

    fn make_subject(root: &Path, id: &str, relax: &[f64], focus: &[f64]) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        write_recording(&dir.join(RELAX_FILE), relax);
        write_recording(&dir.join(FOCUS_FILE), focus);
    }

    #[test]
    fn assembles_labeled_rows_in_sorted_subject_order() {
        let root = std::env::temp_dir().join("mindfold_assemble_test");
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        // Create out of order; assembly must sort.
        make_subject(&root, "S02", &sine(10.0, 100.0, 300), &sine(20.0, 100.0, 300));
        make_subject(&root, "S01", &sine(10.0, 100.0, 300), &sine(20.0, 100.0, 300));

        let dataset = assemble(&test_config(&root)).unwrap();
        // 300 samples, window 100, stride 50 -> 5 windows per state per subject.
        assert_eq!(dataset.n_rows(), 2 * 2 * 5);
        assert_eq!(dataset.unique_subjects(), vec!["S01", "S02"]);
        assert_eq!(&dataset.subjects[0], "S01");
        // First 5 rows of each subject are relax, next 5 focus.
        assert_eq!(&dataset.y[..5], &[LABEL_RELAX; 5]);
        assert_eq!(&dataset.y[5..10], &[LABEL_FOCUS; 5]);
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn short_subject_skipped_with_remainder_kept() {
        let root = std::env::temp_dir().join("mindfold_skip_test");
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        make_subject(&root, "S01", &sine(10.0, 100.0, 300), &sine(20.0, 100.0, 300));
        // Focus recording one sample short of a single window.
        make_subject(&root, "S02", &sine(10.0, 100.0, 300), &sine(20.0, 100.0, 99));

        let dataset = assemble(&test_config(&root)).unwrap();
        assert_eq!(dataset.unique_subjects(), vec!["S01"]);
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn all_subjects_skipped_is_no_valid_data() {
        let root = std::env::temp_dir().join("mindfold_novalid_test");
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        make_subject(&root, "S01", &[1.0; 10], &[1.0; 10]);

        assert!(matches!(
            assemble(&test_config(&root)),
            Err(PipelineError::NoValidData)
        ));
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_root_and_empty_root_are_explicit_errors() {
        let missing = std::env::temp_dir().join("mindfold_does_not_exist");
        assert!(matches!(
            assemble(&test_config(&missing)),
            Err(PipelineError::DatasetRootMissing { .. })
        ));

        let empty = std::env::temp_dir().join("mindfold_empty_root_test");
        let _ = fs::remove_dir_all(&empty);
        fs::create_dir_all(&empty).unwrap();
        assert!(matches!(
            assemble(&test_config(&empty)),
            Err(PipelineError::NoSubjects { .. })
        ));
        fs::remove_dir_all(&empty).unwrap();
    }

    #[test]
    fn window_trim_drops_head_and_tail_windows() {
        let root = std::env::temp_dir().join("mindfold_trim_test");
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        make_subject(&root, "S01", &sine(10.0, 100.0, 300), &sine(20.0, 100.0, 300));

        let config = PipelineConfig {
            window_trim: WindowTrim {
                leading: 1,
                trailing: 1,
            },
            ..test_config(&root)
        };
        let dataset = assemble(&config).unwrap();
        // 5 windows per state, minus one leading and one trailing each.
        assert_eq!(dataset.n_rows(), 2 * 3);
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn malformed_recording_rejected() {
        let root = std::env::temp_dir().join("mindfold_malformed_test");
        let _ = fs::remove_dir_all(&root);
        let dir = root.join("S01");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RELAX_FILE), "1.0 2.0\nnot-a-number\n").unwrap();
        let err = load_recording(&dir.join(RELAX_FILE)).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSample { line: 2, .. }));
        fs::remove_dir_all(&root).unwrap();
    }
}
