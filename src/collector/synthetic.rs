//! Synthetic sensor rig for machines without the camera, IMU, or GPS.
//!
//! Face frames carry a pulse-modulated skin colour and a slowly nodding
//! head, the IMU reports road vibration around gravity, and the GPS drives
//! east at a steady speed.

use crate::collector::types::{FaceSample, FaceUpdate, InertialSample, PositionSample, SensorEvent};
use crate::collector::unix_now;
use crate::core::hub::SensorHub;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const FACE_RATE_HZ: f64 = 30.0;
pub const INERTIAL_RATE_HZ: f64 = 100.0;
pub const POSITION_RATE_HZ: f64 = 10.0;

const GRAVITY: f64 = 9.81;
const ORIGIN: (f64, f64) = (37.5665, 126.9780);
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Spawns one producer task per stream.
pub struct SyntheticRig {
    hub: SensorHub,
    pulse_bpm: f64,
    speed_kmh: f64,
}

impl SyntheticRig {
    pub fn new(hub: SensorHub) -> Self {
        Self {
            hub,
            pulse_bpm: 72.0,
            speed_kmh: 40.0,
        }
    }

    /// Pulse rate carried by the face colour, in BPM.
    pub fn with_pulse(mut self, bpm: f64) -> Self {
        self.pulse_bpm = bpm;
        self
    }

    pub fn with_speed(mut self, kmh: f64) -> Self {
        self.speed_kmh = kmh;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!(
            pulse_bpm = self.pulse_bpm,
            speed_kmh = self.speed_kmh,
            "starting synthetic rig"
        );
        let start = unix_now();
        let mut tasks = Vec::with_capacity(3);

        let hub = self.hub.clone();
        let bpm = self.pulse_bpm;
        tasks.push(tokio::spawn(emit_every(
            FACE_RATE_HZ,
            cancel.clone(),
            move |rng| {
                let t = unix_now();
                let sample = face_sample(t, t - start, bpm, rng);
                hub.ingest(SensorEvent::Face(FaceUpdate::Sample(sample)));
            },
        )));

        let hub = self.hub.clone();
        tasks.push(tokio::spawn(emit_every(
            INERTIAL_RATE_HZ,
            cancel.clone(),
            move |rng| {
                hub.ingest(SensorEvent::Inertial(inertial_sample(unix_now(), rng)));
            },
        )));

        let hub = self.hub;
        let speed = self.speed_kmh;
        tasks.push(tokio::spawn(emit_every(
            POSITION_RATE_HZ,
            cancel,
            move |rng| {
                let t = unix_now();
                hub.ingest(SensorEvent::Position(position_sample(t, t - start, speed, rng)));
            },
        )));

        tasks
    }
}

async fn emit_every<F>(rate_hz: f64, cancel: CancellationToken, mut emit: F)
where
    F: FnMut(&mut StdRng) + Send,
{
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => emit(&mut rng),
        }
    }
}

/// One face frame `elapsed` seconds into the drive.
pub fn face_sample(timestamp: f64, elapsed: f64, pulse_bpm: f64, rng: &mut impl Rng) -> FaceSample {
    let pulse = (TAU * pulse_bpm / 60.0 * elapsed).sin();
    let mut sample = FaceSample::with_color(
        timestamp,
        [
            150.0 + 0.5 * pulse + rng.gen_range(-0.1..0.1),
            110.0 + 1.0 * pulse + rng.gen_range(-0.1..0.1),
            95.0 + 0.3 * pulse + rng.gen_range(-0.1..0.1),
        ],
    );

    // Nod about the x axis, about ±6 degrees at 0.25 Hz
    let pitch = 0.1 * (TAU * 0.25 * elapsed).sin();
    let (s, c) = pitch.sin_cos();
    sample.rotation = Some([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]);
    sample.translation = Some([
        0.5 * (TAU * 0.1 * elapsed).sin(),
        0.2 * pitch,
        -45.0 + rng.gen_range(-0.05..0.05),
    ]);

    sample.blendshapes.insert("eyeBlinkLeft", rng.gen_range(0.0..0.2));
    sample.blendshapes.insert("eyeBlinkRight", rng.gen_range(0.0..0.2));
    sample.blendshapes.insert("jawOpen", rng.gen_range(0.0..0.05));
    sample
}

pub fn inertial_sample(timestamp: f64, rng: &mut impl Rng) -> InertialSample {
    InertialSample {
        timestamp,
        accel: [
            rng.gen_range(-0.3..0.3),
            rng.gen_range(-0.3..0.3),
            GRAVITY + rng.gen_range(-0.5..0.5),
        ],
        gyro: [
            rng.gen_range(-0.02..0.02),
            rng.gen_range(-0.02..0.02),
            rng.gen_range(-0.05..0.05),
        ],
    }
}

/// A fix on a due-east road, `elapsed` seconds from the origin.
pub fn position_sample(
    timestamp: f64,
    elapsed: f64,
    speed_kmh: f64,
    rng: &mut impl Rng,
) -> PositionSample {
    let meters = speed_kmh / 3.6 * elapsed;
    let lon_scale = METERS_PER_DEGREE * ORIGIN.0.to_radians().cos();
    PositionSample {
        timestamp,
        lat: ORIGIN.0 + rng.gen_range(-2e-6..2e-6),
        lon: ORIGIN.1 + meters / lon_scale,
        speed: (speed_kmh + rng.gen_range(-1.0..1.0)).max(0.0),
    }
}
