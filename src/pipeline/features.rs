//! Per-window feature vectors.
//!
//! Every profile is a pure function from one window to an ordered vector of
//! fixed dimension. Column order is a contract consumed by the per-fold
//! feature selector, so it is enforced by construction (struct-style push
//! order for the engineered profile, a frozen name list for the comprehensive
//! one) and never depends on map iteration order.

use serde::Deserialize;

use crate::pipeline::filter::bandpass_zero_phase;
use crate::pipeline::spectrum::{
    power_spectrum, BandPowerStrategy, BandPowers, FrequencyBand, SpectralAnalyzer, POWER_EPSILON,
};

/// Broadband range used for Hjorth parameters and the filtered-raw profile.
const BROADBAND_HZ: (f64, f64) = (0.5, 45.0);

/// Which vector a window is turned into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureProfile {
    /// The raw window samples, verbatim.
    Raw,
    /// Broadband-filtered samples followed by the engineered vector.
    RawFiltered,
    /// 22 engineered descriptors; band powers via filtered-Welch integrals.
    Engineered,
    /// 24 named descriptors mirroring the research feature set; band powers
    /// via FFT bin masking of the bandpassed window.
    Comprehensive,
}

/// Frozen column order of the comprehensive profile. Alphabetical, matching
/// the sorted-key flattening the research code used; a test pins both the
/// ordering and the length.
pub const COMPREHENSIVE_FIELDS: [&str; 24] = [
    "alpha_ratio",
    "attention",
    "beta_alpha_ratio",
    "beta_ratio",
    "beta_theta_ratio",
    "delta_ratio",
    "energy",
    "gamma_ratio",
    "kurtosis",
    "mean",
    "peak_to_peak",
    "power",
    "relaxation",
    "rms",
    "skewness",
    "spectral_bandwidth",
    "spectral_centroid",
    "spectral_flatness",
    "spectral_rolloff",
    "std",
    "theta_alpha_ratio",
    "theta_ratio",
    "var",
    "zero_crossing_rate",
];

/// Builds one feature vector per window under a fixed profile and sampling
/// rate. Stateless apart from configuration; identical input windows always
/// produce identical vectors.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    profile: FeatureProfile,
    analyzer: SpectralAnalyzer,
    sample_rate: f64,
}

impl FeatureExtractor {
    pub fn new(profile: FeatureProfile, sample_rate: f64) -> Self {
        Self {
            profile,
            analyzer: SpectralAnalyzer::new(sample_rate),
            sample_rate,
        }
    }

    pub fn profile(&self) -> FeatureProfile {
        self.profile
    }

    /// Exact output dimension for a given window length.
    pub fn feature_dim(&self, window_len: usize) -> usize {
        match self.profile {
            FeatureProfile::Raw => window_len,
            FeatureProfile::RawFiltered => window_len + 22,
            FeatureProfile::Engineered => 22,
            FeatureProfile::Comprehensive => COMPREHENSIVE_FIELDS.len(),
        }
    }

    pub fn extract(&self, window: &[f64]) -> Vec<f64> {
        match self.profile {
            FeatureProfile::Raw => window.to_vec(),
            FeatureProfile::RawFiltered => {
                let mut features = bandpass_zero_phase(
                    window,
                    self.sample_rate,
                    BROADBAND_HZ.0,
                    BROADBAND_HZ.1,
                );
                features.extend(self.engineered(window));
                features
            }
            FeatureProfile::Engineered => self.engineered(window),
            FeatureProfile::Comprehensive => self.comprehensive(window),
        }
    }

    /// Engineered profile, fixed field order:
    /// 5 absolute band powers, 5 relative band powers, alpha/theta,
    /// beta/alpha, 3 Hjorth parameters, 6 time-domain statistics,
    /// spectral entropy.
    fn engineered(&self, window: &[f64]) -> Vec<f64> {
        let powers = self
            .analyzer
            .extract_band_powers(BandPowerStrategy::FilteredWelch, window);
        let total = self.analyzer.total_welch_power(window);

        let mut features = Vec::with_capacity(22);
        for band in FrequencyBand::ALL {
            features.push(powers.get(band));
        }
        for band in FrequencyBand::ALL {
            features.push(powers.get(band) / (total + POWER_EPSILON));
        }
        features.push(powers.alpha / (powers.theta + POWER_EPSILON));
        features.push(powers.beta / (powers.alpha + POWER_EPSILON));

        let broadband = bandpass_zero_phase(
            window,
            self.sample_rate,
            BROADBAND_HZ.0,
            BROADBAND_HZ.1,
        );
        let (activity, mobility, complexity) = hjorth_parameters(&broadband);
        features.push(activity);
        features.push(mobility);
        features.push(complexity);

        let mean_v = mean(window);
        let std_v = variance(window).sqrt();
        features.push(mean_v);
        features.push(std_v);
        features.push(skewness(window));
        features.push(excess_kurtosis(window));
        features.push(rms(window));
        features.push(zero_crossing_rate(window));

        let (_, psd) = self.analyzer.welch(window);
        features.push(spectral_entropy(&psd));
        features
    }

    /// Comprehensive profile: values computed individually, then emitted in
    /// [`COMPREHENSIVE_FIELDS`] order.
    fn comprehensive(&self, window: &[f64]) -> Vec<f64> {
        let band = |b: FrequencyBand| self.band_power_filtered_mask(window, b);
        let powers = BandPowers {
            delta: band(FrequencyBand::Delta),
            theta: band(FrequencyBand::Theta),
            alpha: band(FrequencyBand::Alpha),
            beta: band(FrequencyBand::Beta),
            gamma: band(FrequencyBand::Gamma),
        };
        let BandPowers {
            delta,
            theta,
            alpha,
            beta,
            gamma,
        } = powers;
        let total = powers.total();

        let attention = beta / (alpha + theta + POWER_EPSILON);
        let relaxation = alpha / (theta + alpha + beta + POWER_EPSILON);

        let mean_v = mean(window);
        let var_v = variance(window);
        let std_v = var_v.sqrt();
        let (centroid, rolloff, bandwidth, flatness) = spectral_shape(window, self.sample_rate);

        // Same order as COMPREHENSIVE_FIELDS.
        vec![
            alpha / (total + POWER_EPSILON),
            attention,
            beta / (alpha + POWER_EPSILON),
            beta / (total + POWER_EPSILON),
            beta / (theta + POWER_EPSILON),
            delta / (total + POWER_EPSILON),
            window.iter().map(|s| s * s).sum::<f64>(),
            gamma / (total + POWER_EPSILON),
            excess_kurtosis(window),
            mean_v,
            peak_to_peak(window),
            window.iter().map(|s| s * s).sum::<f64>() / window.len() as f64,
            relaxation,
            rms(window),
            skewness(window),
            bandwidth,
            centroid,
            flatness,
            rolloff,
            std_v,
            theta / (alpha + POWER_EPSILON),
            theta / (total + POWER_EPSILON),
            var_v,
            sign_change_count(window),
        ]
    }

    /// Band power the way the research extractor computed it: zero-phase
    /// bandpass first, then FFT bin masking of the filtered window.
    fn band_power_filtered_mask(&self, window: &[f64], band: FrequencyBand) -> f64 {
        let (lo, hi) = band.range_hz();
        let filtered = bandpass_zero_phase(window, self.sample_rate, lo, hi);
        self.analyzer
            .band_power(BandPowerStrategy::FftBinMask, &filtered, band)
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn variance(samples: &[f64]) -> f64 {
    let m = mean(samples);
    samples.iter().map(|&s| (s - m) * (s - m)).sum::<f64>() / samples.len() as f64
}

fn rms(samples: &[f64]) -> f64 {
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

fn peak_to_peak(samples: &[f64]) -> f64 {
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

fn skewness(samples: &[f64]) -> f64 {
    let m = mean(samples);
    let std = variance(samples).sqrt();
    let m3 = samples.iter().map(|&s| (s - m).powi(3)).sum::<f64>() / samples.len() as f64;
    m3 / (std.powi(3) + POWER_EPSILON)
}

fn excess_kurtosis(samples: &[f64]) -> f64 {
    let m = mean(samples);
    let var = variance(samples);
    let m4 = samples.iter().map(|&s| (s - m).powi(4)).sum::<f64>() / samples.len() as f64;
    m4 / (var * var + POWER_EPSILON) - 3.0
}

/// Fraction of sign changes between successive samples, normalized by 2.
fn zero_crossing_rate(samples: &[f64]) -> f64 {
    sign_change_count(samples) / (2.0 * (samples.len() - 1) as f64)
}

fn sign_change_count(samples: &[f64]) -> f64 {
    samples
        .windows(2)
        .filter(|pair| pair[0].is_sign_negative() != pair[1].is_sign_negative())
        .count() as f64
}

/// Hjorth activity, mobility and complexity. Differences are padded by
/// repeating the first sample, so `dx` and `ddx` keep the window length.
fn hjorth_parameters(samples: &[f64]) -> (f64, f64, f64) {
    let dx = padded_diff(samples);
    let ddx = padded_diff(&dx);
    let var_x = variance(samples);
    let var_dx = variance(&dx);
    let var_ddx = variance(&ddx);
    let activity = var_x;
    let mobility = (var_dx / (var_x + POWER_EPSILON)).sqrt();
    let complexity = (var_ddx / (var_dx + POWER_EPSILON)).sqrt() / (mobility + POWER_EPSILON);
    (activity, mobility, complexity)
}

fn padded_diff(samples: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    out.push(0.0); // first sample repeated, so the leading difference is zero
    out.extend(samples.windows(2).map(|pair| pair[1] - pair[0]));
    out
}

/// Shannon entropy (natural log) of the normalized PSD.
fn spectral_entropy(psd: &[f64]) -> f64 {
    let total: f64 = psd.iter().sum::<f64>() + POWER_EPSILON;
    -psd.iter()
        .map(|&p| p / total)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

/// Spectral centroid, 95 % rolloff, bandwidth and flatness from the raw
/// one-sided FFT power spectrum.
fn spectral_shape(samples: &[f64], sample_rate: f64) -> (f64, f64, f64, f64) {
    let (freqs, power) = power_spectrum(samples, sample_rate);
    let total: f64 = power.iter().sum::<f64>() + POWER_EPSILON;

    let centroid = freqs
        .iter()
        .zip(&power)
        .map(|(&f, &p)| f * p)
        .sum::<f64>()
        / total;

    let mut cumulative = 0.0;
    let mut rolloff = *freqs.last().unwrap_or(&0.0);
    for (&f, &p) in freqs.iter().zip(&power) {
        cumulative += p;
        if cumulative >= 0.95 * total {
            rolloff = f;
            break;
        }
    }

    let bandwidth = (freqs
        .iter()
        .zip(&power)
        .map(|(&f, &p)| (f - centroid) * (f - centroid) * p)
        .sum::<f64>()
        / total)
        .sqrt();

    let log_mean = power.iter().map(|&p| (p + 1e-10).ln()).sum::<f64>() / power.len() as f64;
    let arithmetic = power.iter().sum::<f64>() / power.len() as f64;
    let flatness = log_mean.exp() / (arithmetic + POWER_EPSILON);

    (centroid, rolloff, bandwidth, flatness)
}
