//! Periodic aggregation: snapshot every history, derive one row, hand it off.
//!
//! Snapshots are taken independently, so the three streams may describe
//! slightly different wall-clock windows within one tick. No history lock is
//! held while metrics are computed.

use crate::collector::toggles::SharedToggleState;
use crate::collector::types::{FaceSample, InertialSample, PositionSample, BLENDSHAPE_COUNT};
use crate::config::Config;
use crate::core::heart_rate::HeartRateEstimator;
use crate::core::hub::SensorHub;
use crate::core::kinematics::head_velocity;
use crate::core::row::{Row, RowMetrics};
use crate::core::trajectory::linearity;
use crate::sink::RowSender;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drives one row per period until cancelled.
pub struct AggregationScheduler {
    hub: SensorHub,
    toggles: SharedToggleState,
    heart_rate: HeartRateEstimator,
    period: Duration,
    min_face_samples: usize,
}

impl AggregationScheduler {
    pub fn new(hub: SensorHub, toggles: SharedToggleState, config: &Config) -> Self {
        Self::with_settings(hub, toggles, config.tick_period, config.min_face_samples)
    }

    pub fn with_settings(
        hub: SensorHub,
        toggles: SharedToggleState,
        period: Duration,
        min_face_samples: usize,
    ) -> Self {
        Self {
            hub,
            toggles,
            heart_rate: HeartRateEstimator::new(),
            period,
            min_face_samples,
        }
    }

    /// Build the row for the current instant.
    pub fn tick(&mut self) -> Row {
        self.tick_at(Local::now())
    }

    pub fn tick_at(&mut self, timestamp: DateTime<Local>) -> Row {
        let face = self.hub.face.snapshot();
        let inertial = self.hub.inertial.snapshot();
        let position = self.hub.position.snapshot();
        let toggles = self.toggles.snapshot();

        let mut row = Row::empty(timestamp, toggles);
        let metrics = &mut row.metrics;

        (metrics.acc_rms, metrics.gyro_rms) = inertial_rms(&inertial);
        (metrics.speed, metrics.trajectory) = position_summary(&position);

        if face.len() >= self.min_face_samples && !face.is_empty() {
            self.summarize_face(&face, metrics, &mut row.blendshapes);
        }

        row
    }

    fn summarize_face(
        &mut self,
        face: &[FaceSample],
        metrics: &mut RowMetrics,
        blendshapes: &mut [f64; BLENDSHAPE_COUNT],
    ) {
        let (mut r, mut g, mut b) = (Vec::new(), Vec::new(), Vec::new());
        for rgb in face.iter().filter_map(|s| s.avg_rgb) {
            r.push(rgb[0]);
            g.push(rgb[1]);
            b.push(rgb[2]);
        }
        metrics.rgb = [mean(&r), mean(&g), mean(&b)];

        let fps = sampling_rate(face);
        metrics.heart_rate = self.heart_rate.estimate(&r, &g, &b, fps);

        let velocity = head_velocity(face);
        metrics.head_linear_velocity = velocity.linear;
        metrics.head_angular_velocity = velocity.angular;

        *blendshapes = blendshape_means(face);
    }

    /// Emit rows until `cancel` fires. The token is checked once per period.
    pub async fn run(mut self, sink: RowSender, cancel: CancellationToken) {
        tracing::info!(period_secs = self.period.as_secs_f64(), "aggregation started");

        while !cancel.is_cancelled() {
            let row = self.tick();
            tracing::debug!(
                face = self.hub.face.len(),
                heart_rate = row.metrics.heart_rate,
                speed = row.metrics.speed,
                "row ready"
            );
            sink.submit(row);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        tracing::info!("aggregation stopped");
    }
}

/// Per-axis RMS of accel and gyro, zeros for an empty window.
pub fn inertial_rms(samples: &[InertialSample]) -> ([f64; 3], [f64; 3]) {
    let mut accel = [0.0; 3];
    let mut gyro = [0.0; 3];
    for axis in 0..3 {
        accel[axis] = rms(samples.iter().map(|s| s.accel[axis]));
        gyro[axis] = rms(samples.iter().map(|s| s.gyro[axis]));
    }
    (accel, gyro)
}

/// Mean speed and lon/lat linearity.
pub fn position_summary(samples: &[PositionSample]) -> (f64, f64) {
    let speeds: Vec<f64> = samples.iter().map(|s| s.speed).collect();
    let lon: Vec<f64> = samples.iter().map(|s| s.lon).collect();
    let lat: Vec<f64> = samples.iter().map(|s| s.lat).collect();
    (mean(&speeds), linearity(&lon, &lat))
}

/// Frames per second over the window, 0 when the span is not positive.
pub fn sampling_rate(samples: &[FaceSample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if last.timestamp > first.timestamp => {
            samples.len() as f64 / (last.timestamp - first.timestamp)
        }
        _ => 0.0,
    }
}

/// Mean of each blendshape over the samples that carry it.
pub fn blendshape_means(samples: &[FaceSample]) -> [f64; BLENDSHAPE_COUNT] {
    let mut sums = [0.0; BLENDSHAPE_COUNT];
    let mut counts = [0usize; BLENDSHAPE_COUNT];
    for sample in samples {
        for (idx, value) in sample.blendshapes.present() {
            sums[idx] += value;
            counts[idx] += 1;
        }
    }

    let mut means = [0.0; BLENDSHAPE_COUNT];
    for idx in 0..BLENDSHAPE_COUNT {
        if counts[idx] > 0 {
            means[idx] = sums[idx] / counts[idx] as f64;
        }
    }
    means
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum_sq, n) = values.fold((0.0, 0usize), |(acc, n), v| (acc + v * v, n + 1));
    if n == 0 {
        0.0
    } else {
        (sum_sq / n as f64).sqrt()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::toggles::ToggleState;
    use crate::collector::types::{blendshape_index, BlendshapeSet, FaceUpdate, SensorEvent};

    fn scheduler(hub: &SensorHub, min_face_samples: usize) -> AggregationScheduler {
        AggregationScheduler::with_settings(
            hub.clone(),
            ToggleState::shared(),
            Duration::from_secs(1),
            min_face_samples,
        )
    }

    #[test]
    fn test_inertial_rms_unit_x() {
        let samples = vec![
            InertialSample {
                timestamp: 0.0,
                accel: [1.0, 0.0, 0.0],
                gyro: [0.0, 0.0, 0.0],
            };
            25
        ];
        let (accel, gyro) = inertial_rms(&samples);
        assert!((accel[0] - 1.0).abs() < 1e-12);
        assert_eq!(accel[1], 0.0);
        assert_eq!(accel[2], 0.0);
        assert_eq!(gyro, [0.0; 3]);
        assert_eq!(inertial_rms(&[]), ([0.0; 3], [0.0; 3]));
    }

    fn track(step_deg: f64) -> Vec<PositionSample> {
        (0..10)
            .map(|i| PositionSample {
                timestamp: i as f64,
                lat: 37.0 + i as f64 * step_deg,
                lon: 127.0 + i as f64 * step_deg,
                speed: 30.0 + i as f64,
            })
            .collect()
    }

    #[test]
    fn test_position_summary() {
        let (speed, trajectory) = position_summary(&track(1e-2));
        assert!((speed - 34.5).abs() < 1e-9);
        assert!(trajectory > 0.99);
        assert_eq!(position_summary(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_short_track_is_epsilon_dominated() {
        // 1e-4 degree steps: sxx * syy is about 7e-13, far below the 1e-9 guard
        let (_, trajectory) = position_summary(&track(1e-4));
        assert!(trajectory < 0.01, "trajectory {trajectory}");
    }

    #[test]
    fn test_blendshape_mean_excludes_missing_keys() {
        let jaw = blendshape_index("jawOpen").unwrap();
        let blink = blendshape_index("eyeBlinkLeft").unwrap();

        let mut samples = Vec::new();
        for (i, value) in [Some(0.2), None, Some(0.6)].into_iter().enumerate() {
            let mut set = BlendshapeSet::default();
            if let Some(v) = value {
                set.insert("jawOpen", v);
            }
            samples.push(FaceSample {
                timestamp: i as f64,
                blendshapes: set,
                avg_rgb: None,
                rotation: None,
                translation: None,
            });
        }

        let means = blendshape_means(&samples);
        assert!((means[jaw] - 0.4).abs() < 1e-12);
        assert_eq!(means[blink], 0.0);
    }

    #[test]
    fn test_sampling_rate() {
        let samples: Vec<FaceSample> = (0..100)
            .map(|i| FaceSample::with_color(10.0 + i as f64 * 0.05, [0.0; 3]))
            .collect();
        // 100 samples over 4.95 s
        assert!((sampling_rate(&samples) - 100.0 / 4.95).abs() < 1e-9);
        assert_eq!(sampling_rate(&samples[..1]), 0.0);
    }

    #[test]
    fn test_face_columns_need_enough_samples() {
        let hub = SensorHub::with_defaults();
        for i in 0..99 {
            let sample = FaceSample::with_color(i as f64 / 30.0, [120.0, 90.0, 80.0]);
            hub.ingest(SensorEvent::Face(FaceUpdate::Sample(sample)));
        }

        let mut aggregation = scheduler(&hub, 100);
        assert_eq!(aggregation.tick().metrics.rgb, [0.0; 3]);

        hub.ingest(SensorEvent::Face(FaceUpdate::Sample(FaceSample::with_color(
            100.0 / 30.0,
            [120.0, 90.0, 80.0],
        ))));
        let row = aggregation.tick();
        assert_eq!(row.metrics.rgb, [120.0, 90.0, 80.0]);
        // 100 frames is under five seconds of signal
        assert_eq!(row.metrics.heart_rate, 0.0);
    }

    #[test]
    fn test_toggles_pass_through() {
        let hub = SensorHub::with_defaults();
        let toggles = ToggleState::shared();
        toggles.set(2, 1);
        let mut aggregation =
            AggregationScheduler::with_settings(hub, toggles, Duration::from_secs(1), 100);
        assert_eq!(aggregation.tick().toggles, [0, 0, 1]);
    }
}
