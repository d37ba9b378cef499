//! Volume ratio: latest sample against a trailing baseline.

/// Default number of samples in the baseline.
pub const DEFAULT_VOLUME_WINDOW: usize = 5;

/// Last sample divided by the mean of the `window` samples before it.
///
/// The newest sample is never part of its own baseline. Returns the neutral
/// 1.0 with fewer than `window + 1` samples or a non-positive baseline.
pub fn volume_ratio(volumes: &[f64], window: usize) -> f64 {
    if window == 0 || volumes.len() < window + 1 {
        return 1.0;
    }

    let last_idx = volumes.len() - 1;
    let baseline = &volumes[last_idx - window..last_idx];
    let mean = baseline.iter().sum::<f64>() / window as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return 1.0;
    }
    volumes[last_idx] / mean
}
