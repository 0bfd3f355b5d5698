//! Remote heart-rate estimation from mean facial skin colour (rPPG).
//!
//! The pipeline follows the Plane-Orthogonal-to-Skin (POS) method:
//! detrend each channel, project onto two chrominance axes, combine them with
//! a robust scale ratio, band-pass to the cardiac band and pick the spectral
//! peak. Per-window estimates are then smoothed over the last 30 valid values.

use num_complex::Complex64;
use rustfft::FftPlanner;
use statrs::statistics::{Data, Median, Statistics};
use std::collections::VecDeque;
use std::f64::consts::{PI, SQRT_2};

/// Seconds of signal needed before a spectral estimate is attempted.
pub const MIN_WINDOW_SECS: f64 = 5.0;

/// Band-pass corners in Hz (48–150 BPM).
const PASSBAND_HZ: (f64, f64) = (0.8, 2.5);

/// Spectral search range in Hz (42–240 BPM).
const SEARCH_HZ: (f64, f64) = (0.7, 4.0);

/// Estimates outside this open interval are discarded.
const VALID_BPM: (f64, f64) = (30.0, 180.0);

/// Bounds for the POS combination weight.
const ALPHA_RANGE: (f64, f64) = (0.3, 3.0);

/// Number of valid estimates kept for smoothing.
const SMOOTHING_LEN: usize = 30;

/// MAD to standard deviation under a Gaussian.
const MAD_SCALE: f64 = 1.4826;

/// Stateful heart-rate estimator. One instance lives for the whole session.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    history: VecDeque<f64>,
    last_output: f64,
}

impl Default for HeartRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartRateEstimator {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(SMOOTHING_LEN),
            last_output: 0.0,
        }
    }

    /// Estimate a smoothed heart rate in BPM.
    ///
    /// Returns 0 when the window is shorter than five seconds at `fps`.
    /// When the window is long enough but the raw estimate is implausible,
    /// the previously emitted value is returned.
    pub fn estimate(&mut self, r: &[f64], g: &[f64], b: &[f64], fps: f64) -> f64 {
        match raw_bpm(r, g, b, fps) {
            Some(bpm) => self.smooth(bpm),
            None => 0.0,
        }
    }

    /// Feed one raw estimate through the outlier-filtered rolling mean.
    pub fn smooth(&mut self, bpm: f64) -> f64 {
        if !(bpm > VALID_BPM.0 && bpm < VALID_BPM.1) {
            tracing::debug!(bpm, "discarding implausible heart-rate estimate");
            return self.last_output;
        }

        if self.history.len() == SMOOTHING_LEN {
            self.history.pop_front();
        }
        self.history.push_back(bpm);

        let mean = self.history.iter().mean();
        let std = self.history.iter().population_std_dev();
        let kept: Vec<f64> = self
            .history
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() <= std)
            .collect();

        self.last_output = if kept.is_empty() { 0.0 } else { kept.iter().mean() };
        self.last_output
    }

    /// Number of valid estimates currently held for smoothing.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Unsmoothed heart rate in BPM, rounded to 0.1.
///
/// `None` when the channels differ in length, `fps` is not positive, or the
/// window holds fewer than `5 · fps` samples.
pub fn raw_bpm(r: &[f64], g: &[f64], b: &[f64], fps: f64) -> Option<f64> {
    let n = r.len();
    if g.len() != n || b.len() != n || !(fps > 0.0) || !fps.is_finite() {
        return None;
    }
    if (n as f64) < MIN_WINDOW_SECS * fps {
        return None;
    }

    let r = detrend(r);
    let g = detrend(g);
    let b = detrend(b);

    let (x, y) = pos_projection(&r, &g, &b);
    let alpha = pos_alpha(&x, &y);
    let combined: Vec<f64> = x.iter().zip(&y).map(|(x, y)| x - alpha * y).collect();

    let filtered = detrend(&bandpass(&combined, fps, PASSBAND_HZ.0, PASSBAND_HZ.1));

    let peak_hz = dominant_frequency(&filtered, fps, SEARCH_HZ.0, SEARCH_HZ.1)?;
    Some((peak_hz * 60.0 * 10.0).round() / 10.0)
}

/// `X = 3R − 2G`, `Y = 1.5R + G − 1.5B` on detrended channels.
pub fn pos_projection(r: &[f64], g: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    r.iter()
        .zip(g)
        .zip(b)
        .map(|((r, g), b)| (3.0 * r - 2.0 * g, 1.5 * r + g - 1.5 * b))
        .unzip()
}

/// Weight of the second POS axis, always within `[0.3, 3.0]`.
pub fn pos_alpha(x: &[f64], y: &[f64]) -> f64 {
    let std_y = robust_std(y).max(1e-6);
    let alpha = robust_std(x) / std_y;
    if alpha.is_nan() {
        return ALPHA_RANGE.0;
    }
    alpha.clamp(ALPHA_RANGE.0, ALPHA_RANGE.1)
}

/// `1.4826 · median(|v − median(v)|)`; 0 for an empty slice.
pub fn robust_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let median = Data::new(values.to_vec()).median();
    let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    MAD_SCALE * Data::new(deviations).median()
}

/// Second-order band-pass biquad from the bilinear transform, Q = √2.
///
/// The centre sits at `√(low · high)` and the bandwidth is centre / Q, so for
/// 0.8–2.5 Hz the −3 dB band is about 1.0–2.0 Hz and the nominal corners are
/// near −6 dB.
///
/// Returns the input unchanged when either normalised corner falls outside
/// (0, 1) or the signal has fewer than 5 samples.
pub fn bandpass(signal: &[f64], fs: f64, low_hz: f64, high_hz: f64) -> Vec<f64> {
    let nyquist = 0.5 * fs;
    let low = low_hz / nyquist;
    let high = high_hz / nyquist;
    let in_range = |w: f64| w > 0.0 && w < 1.0;
    if !in_range(low) || !in_range(high) || signal.len() < 5 {
        return signal.to_vec();
    }

    // Centre at the geometric mean of the corners, prewarped.
    let center_hz = (low_hz * high_hz).sqrt();
    let k = (PI * center_hz / fs).tan();
    let q = SQRT_2;
    let norm = 1.0 / (1.0 + k / q + k * k);
    let b0 = k / q * norm;
    let b2 = -b0;
    let a1 = 2.0 * (k * k - 1.0) * norm;
    let a2 = (1.0 - k / q + k * k) * norm;

    let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
    signal
        .iter()
        .map(|&x| {
            let y = b0 * x + b2 * x2 - a1 * y1 - a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            y
        })
        .collect()
}

/// Frequency of the largest spectral magnitude within `[min_hz, max_hz]`.
pub fn dominant_frequency(signal: &[f64], fs: f64, min_hz: f64, max_hz: f64) -> Option<f64> {
    let n = signal.len();
    if n == 0 {
        return None;
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

    let mut best: Option<(f64, f64)> = None;
    for (k, bin) in buffer.iter().enumerate().take(n / 2 + 1) {
        let freq = k as f64 * fs / n as f64;
        if freq < min_hz || freq > max_hz {
            continue;
        }
        let magnitude = bin.norm();
        if best.map_or(true, |(_, m)| magnitude > m) {
            best = Some((freq, magnitude));
        }
    }
    best.map(|(freq, _)| freq)
}

fn detrend(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().mean();
    values.iter().map(|v| v - mean).collect()
}
