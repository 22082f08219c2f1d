use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("overlap ratio must be in [0, 1), got {value}")]
    InvalidOverlap { value: f64 },
    #[error("sampling rate must be greater than zero, got {value}")]
    InvalidSamplingRate { value: f64 },
    #[error("segment length must be greater than zero, got {value}")]
    InvalidSegmentLength { value: f64 },
    #[error("feature selection must keep at least one column")]
    InvalidFeatureCount,
    #[error("dataset root does not exist: {}", path.display())]
    DatasetRootMissing { path: PathBuf },
    #[error("no subject directories found in {}", path.display())]
    NoSubjects { path: PathBuf },
    #[error("no subject produced any usable windows")]
    NoValidData,
    #[error("malformed sample in {} at line {line}", path.display())]
    MalformedSample { path: PathBuf, line: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to render report: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PipelineError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PipelineError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for PipelineError {
    fn from(value: image::ImageError) -> Self {
        PipelineError::Plot(value.to_string())
    }
}
