//! Core processing for the motion-sickness logger.
//!
//! This module contains:
//! - Bounded per-stream histories and the hub that fills them
//! - Signal processing (heart rate, head kinematics, trajectory linearity)
//! - The periodic aggregation that turns snapshots into output rows

pub mod aggregator;
pub mod heart_rate;
pub mod history;
pub mod hub;
pub mod kinematics;
pub mod row;
pub mod trajectory;

// Re-export commonly used types
pub use aggregator::AggregationScheduler;
pub use heart_rate::HeartRateEstimator;
pub use history::{BoundedHistory, SharedHistory};
pub use hub::SensorHub;
pub use kinematics::{head_velocity, HeadVelocity};
pub use row::{Row, RowMetrics, COLUMN_COUNT};
pub use trajectory::linearity;
