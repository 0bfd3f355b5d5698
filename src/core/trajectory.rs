//! Trajectory linearity from a GPS track.

/// Guards the denominator when one sequence is constant.
const EPSILON: f64 = 1e-9;

/// Squared Pearson correlation between `x` and `y`, in `[0, 1]`.
///
/// A straight-line drive scores close to 1, winding roads score lower.
/// Returns 0 for empty or mismatched input.
pub fn linearity(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    (sxy * sxy / (sxx * syy + EPSILON)).clamp(0.0, 1.0)
}
