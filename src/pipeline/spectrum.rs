//! Power spectra and band-power extraction.
//!
//! Two band-power strategies are supported and must not be mixed within one
//! feature profile:
//!
//! * [`BandPowerStrategy::FilteredWelch`] — zero-phase 4th-order Butterworth
//!   bandpass, then a trapezoidal integral of the Welch PSD of the filtered
//!   window over the whole analyzed bandwidth. The filter already confined the
//!   energy to-band, so the full-spectrum integral is the in-band power.
//! * [`BandPowerStrategy::FftBinMask`] — raw FFT power spectrum of the window,
//!   summing only bins whose frequency falls in `[lo, hi)`.
//!
//! The two are not numerically identical; callers pick one per profile.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::pipeline::filter::bandpass_zero_phase;

/// Guard added to denominators so zero-power bands divide to 0, not NaN.
pub const POWER_EPSILON: f64 = 1e-12;

/// The five standard EEG bands shared by the analyzer and feature builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrequencyBand {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl FrequencyBand {
    pub const ALL: [FrequencyBand; 5] = [
        FrequencyBand::Delta,
        FrequencyBand::Theta,
        FrequencyBand::Alpha,
        FrequencyBand::Beta,
        FrequencyBand::Gamma,
    ];

    /// Band edges in Hz.
    pub fn range_hz(self) -> (f64, f64) {
        match self {
            FrequencyBand::Delta => (0.5, 4.0),
            FrequencyBand::Theta => (4.0, 8.0),
            FrequencyBand::Alpha => (8.0, 13.0),
            FrequencyBand::Beta => (13.0, 30.0),
            FrequencyBand::Gamma => (30.0, 50.0),
        }
    }
}

/// How in-band power is computed. See the module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandPowerStrategy {
    FilteredWelch,
    FftBinMask,
}

/// Absolute power per band, in fixed delta..gamma order.
#[derive(Clone, Copy, Debug, Default)]
pub struct BandPowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandPowers {
    pub fn total(&self) -> f64 {
        self.delta + self.theta + self.alpha + self.beta + self.gamma
    }

    pub fn get(&self, band: FrequencyBand) -> f64 {
        match band {
            FrequencyBand::Delta => self.delta,
            FrequencyBand::Theta => self.theta,
            FrequencyBand::Alpha => self.alpha,
            FrequencyBand::Beta => self.beta,
            FrequencyBand::Gamma => self.gamma,
        }
    }
}

/// One-sided FFT power spectrum (`|X[k]|^2`) with its frequency axis.
pub fn power_spectrum(samples: &[f64], sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    let n = samples.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buffer);
    let n_bins = n / 2 + 1;
    let freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate / n as f64)
        .collect();
    let power: Vec<f64> = buffer[..n_bins].iter().map(|c| c.norm_sqr()).collect();
    (freqs, power)
}

/// Welch power spectral density: Hann-windowed segments of `nperseg` samples
/// with 50 % overlap, averaged one-sided periodograms in density scaling
/// (power per Hz). Falls back to a single segment when the window is short.
pub fn welch_psd(samples: &[f64], sample_rate: f64, nperseg: usize) -> (Vec<f64>, Vec<f64>) {
    let nperseg = nperseg.min(samples.len()).max(2);
    let step = (nperseg / 2).max(1);
    let hann: Vec<f64> = (0..nperseg)
        .map(|i| {
            0.5 * (1.0
                - (2.0 * std::f64::consts::PI * i as f64 / (nperseg - 1) as f64).cos())
        })
        .collect();
    let window_norm: f64 = hann.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let n_bins = nperseg / 2 + 1;
    let mut psd = vec![0.0; n_bins];
    let mut n_segments = 0usize;
    let mut start = 0;
    while start + nperseg <= samples.len() {
        let mut buffer: Vec<Complex<f64>> = samples[start..start + nperseg]
            .iter()
            .zip(&hann)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buffer);
        for (k, bin) in psd.iter_mut().enumerate() {
            // One-sided density scaling; interior bins carry both halves.
            let scale = if k == 0 || (nperseg % 2 == 0 && k == n_bins - 1) {
                1.0
            } else {
                2.0
            };
            *bin += scale * buffer[k].norm_sqr() / (sample_rate * window_norm);
        }
        n_segments += 1;
        start += step;
    }
    if n_segments > 0 {
        for bin in &mut psd {
            *bin /= n_segments as f64;
        }
    }
    let freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate / nperseg as f64)
        .collect();
    (freqs, psd)
}

/// Trapezoidal integral of uniformly spaced samples.
pub fn trapezoid(y: &[f64], dx: f64) -> f64 {
    if y.len() < 2 {
        return 0.0;
    }
    let interior: f64 = y[1..y.len() - 1].iter().sum();
    dx * (0.5 * (y[0] + y[y.len() - 1]) + interior)
}

/// Per-window spectral analyzer bound to one sampling rate.
#[derive(Clone, Debug)]
pub struct SpectralAnalyzer {
    sample_rate: f64,
    welch_nperseg: usize,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            welch_nperseg: 256,
        }
    }

    /// In-band power for one band under the given strategy.
    pub fn band_power(
        &self,
        strategy: BandPowerStrategy,
        window: &[f64],
        band: FrequencyBand,
    ) -> f64 {
        let (lo, hi) = band.range_hz();
        match strategy {
            BandPowerStrategy::FilteredWelch => {
                let filtered = bandpass_zero_phase(window, self.sample_rate, lo, hi);
                let (freqs, psd) = welch_psd(&filtered, self.sample_rate, self.welch_nperseg);
                let df = if freqs.len() > 1 { freqs[1] - freqs[0] } else { 0.0 };
                trapezoid(&psd, df)
            }
            BandPowerStrategy::FftBinMask => {
                let (freqs, power) = power_spectrum(window, self.sample_rate);
                freqs
                    .iter()
                    .zip(&power)
                    .filter(|(&f, _)| f >= lo && f < hi)
                    .map(|(_, &p)| p)
                    .sum()
            }
        }
    }

    /// Powers for all five bands, one strategy throughout.
    pub fn extract_band_powers(&self, strategy: BandPowerStrategy, window: &[f64]) -> BandPowers {
        BandPowers {
            delta: self.band_power(strategy, window, FrequencyBand::Delta),
            theta: self.band_power(strategy, window, FrequencyBand::Theta),
            alpha: self.band_power(strategy, window, FrequencyBand::Alpha),
            beta: self.band_power(strategy, window, FrequencyBand::Beta),
            gamma: self.band_power(strategy, window, FrequencyBand::Gamma),
        }
    }

    /// Full-spectrum Welch integral of the unfiltered window. Used as the
    /// denominator for relative band powers.
    pub fn total_welch_power(&self, window: &[f64]) -> f64 {
        let (freqs, psd) = welch_psd(window, self.sample_rate, self.welch_nperseg);
        let df = if freqs.len() > 1 { freqs[1] - freqs[0] } else { 0.0 };
        trapezoid(&psd, df)
    }

    /// Welch PSD at this analyzer's segment size.
    pub fn welch(&self, window: &[f64]) -> (Vec<f64>, Vec<f64>) {
        welch_psd(window, self.sample_rate, self.welch_nperseg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, amplitude: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn welch_power_of_unit_sine_is_half() {
        // Mean square of a unit sine is 0.5; the PSD integral should match.
        let signal = sine(10.0, 1.0, 500.0, 5000);
        let analyzer = SpectralAnalyzer::new(500.0);
        let total = analyzer.total_welch_power(&signal);
        assert!((total - 0.5).abs() < 0.05, "total = {total}");
    }

    #[test]
    fn alpha_sine_lands_in_alpha_band_both_strategies() {
        let signal = sine(10.0, 1.0, 500.0, 2500);
        let analyzer = SpectralAnalyzer::new(500.0);

        // Bin masking puts essentially everything in the alpha bins.
        let masked = analyzer.extract_band_powers(BandPowerStrategy::FftBinMask, &signal);
        assert!(masked.alpha / (masked.total() + POWER_EPSILON) > 0.9);

        // The filtered path loses some band-center energy to the 8 and 13 Hz
        // skirts, but alpha must still dominate every neighbor clearly.
        let filtered = analyzer.extract_band_powers(BandPowerStrategy::FilteredWelch, &signal);
        for (other, name) in [
            (filtered.delta, "delta"),
            (filtered.theta, "theta"),
            (filtered.beta, "beta"),
            (filtered.gamma, "gamma"),
        ] {
            assert!(
                filtered.alpha > 1.8 * other,
                "alpha {} vs {name} {}",
                filtered.alpha,
                other
            );
        }
        assert!(filtered.alpha / (filtered.total() + POWER_EPSILON) > 0.5);
    }

    #[test]
    fn beta_component_raises_beta_power_only() {
        // The focus scenario: 10 Hz base in both states, extra 20 Hz at half
        // amplitude in the focused state. Alpha power stays put, beta rises.
        let relax = sine(10.0, 1.0, 500.0, 5000);
        let focus: Vec<f64> = relax
            .iter()
            .zip(sine(20.0, 0.5, 500.0, 5000))
            .map(|(&a, b)| a + b)
            .collect();
        let analyzer = SpectralAnalyzer::new(500.0);
        let p_relax = analyzer.extract_band_powers(BandPowerStrategy::FilteredWelch, &relax);
        let p_focus = analyzer.extract_band_powers(BandPowerStrategy::FilteredWelch, &focus);
        assert!(p_focus.beta > 1.5 * p_relax.beta);
        let alpha_shift = (p_focus.alpha - p_relax.alpha).abs() / p_relax.alpha;
        assert!(alpha_shift < 0.1, "alpha moved by {alpha_shift}");
        assert!(p_relax.alpha > p_relax.beta);
    }

    #[test]
    fn trapezoid_integrates_line() {
        let y = [0.0, 1.0, 2.0, 3.0];
        assert!((trapezoid(&y, 0.5) - 2.25).abs() < 1e-12);
        assert_eq!(trapezoid(&[1.0], 0.5), 0.0);
    }

    #[test]
    fn power_spectrum_peak_at_signal_frequency() {
        let signal = sine(25.0, 1.0, 500.0, 1000);
        let (freqs, power) = power_spectrum(&signal, 500.0);
        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| freqs[i])
            .unwrap();
        assert!((peak - 25.0).abs() < 1.0);
    }

    #[test]
    fn band_edges_cover_half_to_fifty_hz() {
        let mut expected_lo = 0.5;
        for band in FrequencyBand::ALL {
            let (lo, hi) = band.range_hz();
            assert_eq!(lo, expected_lo);
            assert!(hi > lo);
            expected_lo = hi;
        }
        assert_eq!(expected_lo, 50.0);
    }
}
