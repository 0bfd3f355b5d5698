//! Sensor producers for the motion-sickness logger.
//!
//! Every producer validates its input and hands typed samples to the
//! [`SensorHub`](crate::core::SensorHub). Nothing past this module sees raw
//! wire data.

pub mod face_socket;
pub mod nmea;
pub mod synthetic;
pub mod toggles;
pub mod types;

// Re-export commonly used types
pub use face_socket::FaceListener;
pub use synthetic::SyntheticRig;
pub use toggles::{SharedToggleState, ToggleFile, ToggleState, TOGGLE_COUNT};
pub use types::{
    FaceFrame, FaceSample, FaceUpdate, FrameError, InertialSample, PositionSample, SensorEvent,
    BLENDSHAPE_COUNT, BLENDSHAPE_NAMES,
};

/// Wall-clock seconds since the Unix epoch, used to stamp samples from
/// producers that have no clock of their own.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Read one `\n`-terminated line into `buf`, replacing its contents.
///
/// Works on raw bytes so a corrupt line is left for the caller to reject
/// instead of ending the stream. Returns `Ok(false)` at EOF.
pub(crate) async fn read_raw_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    buf.clear();
    Ok(reader.read_until(b'\n', buf).await? > 0)
}
