//! Butterworth IIR filtering for band decomposition.
//!
//! Bandpass filters are built as a cascade of second-order Butterworth
//! high- and lowpass biquads (4th-order overall) and applied forward then
//! backward so the result has no phase shift relative to the input.

/// Second-order IIR section in direct form II transposed.
#[derive(Clone, Debug)]
pub struct Biquad {
    /// Numerator coefficients [b0, b1, b2]
    b: [f64; 3],
    /// Denominator coefficients [a0=1, a1, a2]
    a: [f64; 3],
    state: [f64; 2],
}

impl Biquad {
    /// Second-order Butterworth lowpass via the bilinear transform.
    pub fn lowpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let sqrt2 = std::f64::consts::SQRT_2;
        let norm = 1.0 / (1.0 + sqrt2 * k + k2);
        Self {
            b: [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm],
            state: [0.0, 0.0],
        }
    }

    /// Second-order Butterworth highpass via the bilinear transform.
    pub fn highpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let sqrt2 = std::f64::consts::SQRT_2;
        let norm = 1.0 / (1.0 + sqrt2 * k + k2);
        Self {
            b: [norm, -2.0 * norm, norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm],
            state: [0.0, 0.0],
        }
    }

    pub fn filter(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state[0];
        self.state[0] = self.b[1] * input - self.a[1] * output + self.state[1];
        self.state[1] = self.b[2] * input - self.a[2] * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = [0.0, 0.0];
    }
}

/// 4th-order Butterworth bandpass: 2nd-order highpass at the low cut cascaded
/// with a 2nd-order lowpass at the high cut.
#[derive(Clone, Debug)]
pub struct BandpassFilter {
    highpass: Biquad,
    lowpass: Biquad,
}

impl BandpassFilter {
    pub fn new(sample_rate: f64, low_cutoff: f64, high_cutoff: f64) -> Self {
        Self {
            highpass: Biquad::highpass(sample_rate, low_cutoff),
            lowpass: Biquad::lowpass(sample_rate, high_cutoff),
        }
    }

    pub fn filter(&mut self, input: f64) -> f64 {
        self.lowpass.filter(self.highpass.filter(input))
    }

    pub fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
    }
}

/// Zero-phase bandpass: run the cascade forward over the window, then backward
/// over the result with fresh state. Phase shifts cancel; the magnitude
/// response is applied twice.
pub fn bandpass_zero_phase(samples: &[f64], sample_rate: f64, low: f64, high: f64) -> Vec<f64> {
    let mut filter = BandpassFilter::new(sample_rate, low, high);
    let mut forward: Vec<f64> = samples.iter().map(|&s| filter.filter(s)).collect();
    filter.reset();
    for value in forward.iter_mut().rev() {
        *value = filter.filter(*value);
    }
    forward
}
