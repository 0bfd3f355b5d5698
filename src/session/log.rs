//! Per-session ingestion and output counters.
//!
//! Counters are cumulative across runs when a persistence path is set, so
//! `motionsick-logger status` can report totals without a running logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Lock-free counters shared by producers, the scheduler and the sink thread.
#[derive(Debug)]
pub struct SessionLog {
    session_id: Uuid,
    face_samples: AtomicU64,
    face_lost: AtomicU64,
    inertial_samples: AtomicU64,
    position_samples: AtomicU64,
    dropped_frames: AtomicU64,
    rows_emitted: AtomicU64,
    rows_dropped: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            face_samples: AtomicU64::new(0),
            face_lost: AtomicU64::new(0),
            inertial_samples: AtomicU64::new(0),
            position_samples: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            rows_emitted: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that resumes from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous session stats: {e}");
        }

        log
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_face_sample(&self) {
        self.face_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_face_lost(&self) {
        self.face_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inertial_sample(&self) {
        self.inertial_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_position_sample(&self) {
        self.position_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame was rejected at the producer boundary.
    pub fn record_dropped_frame(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row_emitted(&self) {
        self.rows_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A row was discarded because the sink could not keep up.
    pub fn record_row_dropped(&self) {
        self.rows_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id,
            face_samples: self.face_samples.load(Ordering::Relaxed),
            face_lost: self.face_lost.load(Ordering::Relaxed),
            inertial_samples: self.inertial_samples.load(Ordering::Relaxed),
            position_samples: self.position_samples.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            rows_emitted: self.rows_emitted.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics ({}):\n\
             - Face samples: {}\n\
             - Face-lost resets: {}\n\
             - Inertial samples: {}\n\
             - Position fixes: {}\n\
             - Dropped frames: {}\n\
             - Rows written: {}\n\
             - Rows dropped: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.face_samples,
            stats.face_lost,
            stats.inertial_samples,
            stats.position_samples,
            stats.dropped_frames,
            stats.rows_emitted,
            stats.rows_dropped,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk. A no-op without a persistence path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                last_session_id: stats.session_id,
                face_samples: stats.face_samples,
                face_lost: stats.face_lost,
                inertial_samples: stats.inertial_samples,
                position_samples: stats.position_samples,
                dropped_frames: stats.dropped_frames,
                rows_emitted: stats.rows_emitted,
                rows_dropped: stats.rows_dropped,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.face_samples.store(persisted.face_samples, Ordering::Relaxed);
                self.face_lost.store(persisted.face_lost, Ordering::Relaxed);
                self.inertial_samples
                    .store(persisted.inertial_samples, Ordering::Relaxed);
                self.position_samples
                    .store(persisted.position_samples, Ordering::Relaxed);
                self.dropped_frames
                    .store(persisted.dropped_frames, Ordering::Relaxed);
                self.rows_emitted.store(persisted.rows_emitted, Ordering::Relaxed);
                self.rows_dropped.store(persisted.rows_dropped, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub face_samples: u64,
    pub face_lost: u64,
    pub inertial_samples: u64,
    pub position_samples: u64,
    pub dropped_frames: u64,
    pub rows_emitted: u64,
    pub rows_dropped: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub last_session_id: Uuid,
    pub face_samples: u64,
    pub face_lost: u64,
    pub inertial_samples: u64,
    pub position_samples: u64,
    pub dropped_frames: u64,
    pub rows_emitted: u64,
    pub rows_dropped: u64,
    pub last_updated: DateTime<Utc>,
}

pub type SharedSessionLog = Arc<SessionLog>;

pub fn create_shared_log() -> SharedSessionLog {
    Arc::new(SessionLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedSessionLog {
    Arc::new(SessionLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let log = SessionLog::new();
        log.record_face_sample();
        log.record_face_sample();
        log.record_face_lost();
        log.record_row_emitted();

        let stats = log.stats();
        assert_eq!(stats.face_samples, 2);
        assert_eq!(stats.face_lost, 1);
        assert_eq!(stats.rows_emitted, 1);
        assert_eq!(stats.inertial_samples, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let log = SessionLog::with_persistence(path.clone());
        log.record_position_sample();
        log.record_dropped_frame();
        log.save().unwrap();

        let resumed = SessionLog::with_persistence(path);
        let stats = resumed.stats();
        assert_eq!(stats.position_samples, 1);
        assert_eq!(stats.dropped_frames, 1);
        assert_ne!(stats.session_id, log.session_id());
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionLog::new().summary();
        assert!(summary.contains("Face samples"));
        assert!(summary.contains("Rows written"));
    }
}
