/// Slice a continuous signal into fixed-length windows advancing by `stride`.
///
/// Windows start at index 0 and any trailing samples that do not fill a whole
/// window are discarded, never padded. A signal shorter than one window yields
/// an empty vector. Pure and deterministic: both recording states of every
/// subject are segmented with identical arithmetic.
pub fn segment(signal: &[f64], window_len: usize, stride: usize) -> Vec<Vec<f64>> {
    debug_assert!(window_len > 0 && stride > 0);
    if signal.len() < window_len {
        return Vec::new();
    }
    let mut windows = Vec::with_capacity((signal.len() - window_len) / stride + 1);
    let mut start = 0;
    while start + window_len <= signal.len() {
        windows.push(signal[start..start + window_len].to_vec());
        start += stride;
    }
    windows
}

/// Window step for a given overlap ratio: `window_len - floor(window_len * ratio)`.
pub fn stride_for(window_len: usize, overlap_ratio: f64) -> usize {
    window_len - (window_len as f64 * overlap_ratio) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_count_matches_closed_form() {
        // floor((N - L) / stride) + 1 for N >= L
        for (n, l, stride) in [(100, 10, 4), (57, 13, 5), (2500, 2500, 1000), (64, 16, 16)] {
            let signal = vec![0.0; n];
            let expected = (n - l) / stride + 1;
            assert_eq!(segment(&signal, l, stride).len(), expected);
        }
    }

    #[test]
    fn short_signal_yields_nothing() {
        let signal = vec![1.0; 2499];
        assert!(segment(&signal, 2500, 1000).is_empty());
    }

    #[test]
    fn exact_length_yields_one_window() {
        let signal = vec![1.0; 2500];
        let windows = segment(&signal, 2500, 1000);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].len(), 2500);
    }

    #[test]
    fn overlapping_windows_share_samples() {
        let signal: Vec<f64> = (0..20).map(f64::from).collect();
        let windows = segment(&signal, 10, 5);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0][5..], windows[1][..5]);
        // Trailing partial (indices 15..20) is dropped.
        assert_eq!(windows[2][0], 10.0);
    }

    #[test]
    fn stride_from_overlap_ratio() {
        assert_eq!(stride_for(2500, 0.6), 1000);
        assert_eq!(stride_for(2500, 0.0), 2500);
        assert_eq!(stride_for(10, 0.99), 1);
    }
}
