//! The single entry point producers use to hand samples to the core.

use crate::collector::types::{FaceSample, FaceUpdate, InertialSample, PositionSample, SensorEvent};
use crate::config::HistoryCapacity;
use crate::core::history::{BoundedHistory, SharedHistory};
use crate::session::{create_shared_log, SharedSessionLog};

/// Owns one history per sensor stream. Cheap to clone; every clone shares
/// the same histories.
#[derive(Debug, Clone)]
pub struct SensorHub {
    pub face: SharedHistory<FaceSample>,
    pub inertial: SharedHistory<InertialSample>,
    pub position: SharedHistory<PositionSample>,
    session: SharedSessionLog,
}

impl SensorHub {
    pub fn new(capacity: &HistoryCapacity, session: SharedSessionLog) -> Self {
        Self {
            face: BoundedHistory::shared(capacity.face),
            inertial: BoundedHistory::shared(capacity.inertial),
            position: BoundedHistory::shared(capacity.position),
            session,
        }
    }

    /// A hub with default capacities and a throwaway session log.
    pub fn with_defaults() -> Self {
        Self::new(&HistoryCapacity::default(), create_shared_log())
    }

    pub fn session(&self) -> &SharedSessionLog {
        &self.session
    }

    /// Route one event to its history.
    pub fn ingest(&self, event: SensorEvent) {
        match event {
            SensorEvent::Face(FaceUpdate::Sample(sample)) => {
                self.face.append(sample);
                self.session.record_face_sample();
            }
            SensorEvent::Face(FaceUpdate::Lost) => {
                let discarded = self.face.len();
                self.face.clear();
                self.session.record_face_lost();
                if discarded > 0 {
                    tracing::debug!(discarded, "face lost, history cleared");
                }
            }
            SensorEvent::Inertial(sample) => {
                self.inertial.append(sample);
                self.session.record_inertial_sample();
            }
            SensorEvent::Position(sample) => {
                self.position.append(sample);
                self.session.record_position_sample();
            }
        }
    }

    /// Count a frame that never made it past the producer boundary.
    pub fn reject(&self, reason: &dyn std::fmt::Display) {
        tracing::warn!("dropping malformed frame: {reason}");
        self.session.record_dropped_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_lost_clears_history() {
        let hub = SensorHub::with_defaults();
        for i in 0..50 {
            let sample = FaceSample::with_color(i as f64 / 30.0, [1.0, 2.0, 3.0]);
            hub.ingest(SensorEvent::Face(FaceUpdate::Sample(sample)));
        }
        assert_eq!(hub.face.len(), 50);

        hub.ingest(SensorEvent::Face(FaceUpdate::Lost));
        assert_eq!(hub.face.len(), 0);

        let stats = hub.session().stats();
        assert_eq!(stats.face_samples, 50);
        assert_eq!(stats.face_lost, 1);
    }

    #[test]
    fn test_routes_by_stream() {
        let hub = SensorHub::with_defaults();
        hub.ingest(SensorEvent::Inertial(InertialSample {
            timestamp: 0.0,
            accel: [0.0, 0.0, 9.8],
            gyro: [0.0; 3],
        }));
        hub.ingest(SensorEvent::Position(PositionSample {
            timestamp: 0.0,
            lat: 37.5,
            lon: 127.0,
            speed: 40.0,
        }));

        assert_eq!(hub.inertial.len(), 1);
        assert_eq!(hub.position.len(), 1);
        assert!(hub.face.is_empty());
    }

    #[test]
    fn test_clones_share_histories() {
        let hub = SensorHub::with_defaults();
        let producer = hub.clone();
        producer.ingest(SensorEvent::Face(FaceUpdate::Sample(FaceSample::with_color(
            1.0,
            [0.0; 3],
        ))));
        assert_eq!(hub.face.len(), 1);
    }
}
