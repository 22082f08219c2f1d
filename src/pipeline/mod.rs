// src/pipeline/mod.rs
pub mod dataset;
pub mod error;
pub mod features;
pub mod filter;
pub mod mlp;
pub mod preprocess;
pub mod report;
pub mod segment;
pub mod spectrum;
pub mod validate;
pub use dataset::{assemble, Dataset};
pub use error::PipelineError;
pub use features::{FeatureExtractor, FeatureProfile};
pub use mlp::MlpClassifier;
pub use preprocess::{SelectKBest, StandardScaler};
pub use report::{render_summary_png, ReportStyle};
pub use segment::{segment, stride_for};
pub use spectrum::{BandPowerStrategy, BandPowers, FrequencyBand, SpectralAnalyzer};
pub use validate::{run_loso, FoldResult, ValidationSummary};
