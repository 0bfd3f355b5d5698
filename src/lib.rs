//! Motion-sickness logger - in-vehicle sensor summariser for research drives.
//!
//! This library collects three sensor streams while a passenger rides, and
//! once per second writes a single summary row combining them:
//!
//! - **Face**: blendshapes, average skin colour, and head pose from a face
//!   tracker, streamed as JSON lines over TCP
//! - **Inertial**: accelerometer and gyroscope samples
//! - **Position**: GPS fixes from an NMEA serial device
//!
//! Each row carries vehicle vibration (per-axis RMS), speed, how straight
//! the recent path was, a camera-based heart-rate estimate, head motion,
//! mean facial expression, and three operator toggle flags.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Motion-Sickness Logger                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐                                                 │
//! │  │ Face socket │──┐                                              │
//! │  └─────────────┘  │   ┌─────────────┐   ┌─────────────┐          │
//! │  ┌─────────────┐  ├──▶│  SensorHub  │──▶│ Aggregation │          │
//! │  │ NMEA / IMU  │──┘   │ (histories) │   │  (1 s tick) │          │
//! │  └─────────────┘      └─────────────┘   └─────────────┘          │
//! │         │                                      │                 │
//! │         ▼                                      ▼                 │
//! │  ┌─────────────┐                        ┌─────────────┐          │
//! │  │  Session    │                        │ Sink thread │          │
//! │  │   stats     │                        │ (CSV/JSONL) │          │
//! │  └─────────────┘                        └─────────────┘          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use motionsick_logger::{collector, core, sink, session};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let session = session::create_shared_log();
//! let hub = core::SensorHub::new(&Default::default(), session.clone());
//!
//! let sinks: Vec<Box<dyn sink::RowSink>> = vec![Box::new(sink::CsvSink::open("drive.csv")?)];
//! let worker = sink::SinkWorker::spawn(sinks, 64, session)?;
//!
//! let cancel = CancellationToken::new();
//! collector::SyntheticRig::new(hub.clone()).spawn(cancel.clone());
//! let scheduler = core::AggregationScheduler::with_settings(
//!     hub,
//!     collector::ToggleState::shared(),
//!     std::time::Duration::from_secs(1),
//!     100,
//! );
//! scheduler.run(worker.sender(), cancel).await;
//! worker.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod session;
pub mod sink;

// Re-export key types at crate root for convenience
pub use collector::{FaceListener, SensorEvent, SyntheticRig, ToggleState};
pub use config::{Config, SourceConfig};
pub use core::{AggregationScheduler, HeartRateEstimator, Row, SensorHub};
pub use session::{SessionLog, SessionStats, SharedSessionLog};
pub use sink::{CsvSink, JsonlSink, MemorySink, RowSink, SinkWorker};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
