//! Head velocity from consecutive face-pose samples.

use crate::collector::types::{FaceSample, Rotation3};

/// Mean head velocities over a face window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadVelocity {
    /// Translation units per second
    pub linear: f64,
    /// Degrees per second
    pub angular: f64,
}

/// Compute mean linear and angular head velocity over consecutive pairs.
///
/// Pairs with a non-positive time step are skipped. A pair contributes a
/// linear speed only when both translations are present, and an angular
/// speed only when both rotations are present.
pub fn head_velocity(samples: &[FaceSample]) -> HeadVelocity {
    let mut linear = Vec::new();
    let mut angular = Vec::new();

    for pair in samples.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let dt = cur.timestamp - prev.timestamp;
        if dt <= 0.0 {
            continue;
        }

        if let (Some(t1), Some(t2)) = (prev.translation, cur.translation) {
            linear.push(distance(&t1, &t2) / dt);
        }

        if let (Some(r1), Some(r2)) = (prev.rotation, cur.rotation) {
            angular.push(rotation_angle(&r1, &r2).to_degrees() / dt);
        }
    }

    HeadVelocity {
        linear: mean(&linear),
        angular: mean(&angular),
    }
}

/// Angle in radians of the rotation taking `r1` to `r2`, in `[0, π]`.
///
/// Uses `R_delta = R2 · R1ᵀ` and the trace identity
/// `angle = acos((tr(R_delta) − 1) / 2)`.
pub fn rotation_angle(r1: &Rotation3, r2: &Rotation3) -> f64 {
    let delta = mul_transpose(r2, r1);
    let trace = delta[0][0] + delta[1][1] + delta[2][2];
    ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
}

/// `a · bᵀ`
fn mul_transpose(a: &Rotation3, b: &Rotation3) -> Rotation3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[j][k]).sum();
        }
    }
    out
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (y - x).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
