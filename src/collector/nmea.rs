//! NMEA 0183 GPS input.
//!
//! Only RMC sentences are used: they carry fix status, position, and ground
//! speed. The serial line is expected to be configured (9600 8N1, raw)
//! before the device path is handed to [`read_device`].

use crate::collector::types::{PositionSample, SensorEvent};
use crate::collector::{read_raw_line, unix_now};
use crate::core::hub::SensorHub;
use std::path::Path;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;

/// km/h per knot.
pub const KNOTS_TO_KMH: f64 = 1.852;

/// Parse an RMC sentence with an active fix.
///
/// Returns `None` for other sentence types, void fixes (status `V`),
/// checksum mismatches, and malformed fields.
pub fn parse_rmc(line: &str, timestamp: f64) -> Option<PositionSample> {
    let body = verify_checksum(line.trim())?;
    let fields: Vec<&str> = body.split(',').collect();

    if !matches!(fields.first(), Some(&("$GPRMC" | "$GNRMC"))) || fields.len() < 8 {
        return None;
    }
    if fields[2] != "A" {
        return None;
    }

    let lat = nmea_to_decimal(fields[3], fields[4])?;
    let lon = nmea_to_decimal(fields[5], fields[6])?;
    let knots = if fields[7].is_empty() {
        0.0
    } else {
        fields[7].parse::<f64>().ok()?
    };

    Some(PositionSample {
        timestamp,
        lat,
        lon,
        speed: knots * KNOTS_TO_KMH,
    })
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` to signed decimal degrees.
pub fn nmea_to_decimal(coord: &str, hemisphere: &str) -> Option<f64> {
    let raw: f64 = coord.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

/// Strip and check the `*hh` suffix. Sentences without one are accepted.
fn verify_checksum(sentence: &str) -> Option<&str> {
    let Some((body, checksum)) = sentence.split_once('*') else {
        return Some(sentence);
    };
    let expected = u8::from_str_radix(checksum.get(..2)?, 16).ok()?;
    let actual = body
        .strip_prefix('$')?
        .bytes()
        .fold(0u8, |acc, b| acc ^ b);
    (actual == expected).then_some(body)
}

/// Read sentences from an already-configured serial device until EOF or
/// cancellation.
pub async fn read_device(
    path: &Path,
    hub: SensorHub,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    tracing::info!(device = %path.display(), "reading GPS");
    read_sentences(BufReader::new(file), hub, cancel).await
}

/// Feed every valid RMC fix from `reader` into the hub.
pub async fn read_sentences<R>(
    mut reader: R,
    hub: SensorHub,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut waiting_for_fix = false;

    loop {
        let more = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            more = read_raw_line(&mut reader, &mut buf) => more?,
        };
        if !more {
            tracing::debug!("GPS stream ended");
            return Ok(());
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                hub.reject(&format_args!("GPS line is not UTF-8: {e}"));
                continue;
            }
        };

        if !line.contains("RMC") {
            continue;
        }
        match parse_rmc(line, unix_now()) {
            Some(fix) => {
                if waiting_for_fix {
                    tracing::info!(lat = fix.lat, lon = fix.lon, "GPS fix acquired");
                    waiting_for_fix = false;
                }
                hub.ingest(SensorEvent::Position(fix));
            }
            None => {
                if !waiting_for_fix {
                    tracing::info!("no GPS fix yet");
                    waiting_for_fix = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIX: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    #[test]
    fn test_parse_active_fix() {
        let fix = parse_rmc(FIX, 5.0).unwrap();
        assert!((fix.lat - (48.0 + 7.038 / 60.0)).abs() < 1e-9);
        assert!((fix.lon - (11.0 + 31.0 / 60.0)).abs() < 1e-9);
        assert!((fix.speed - 22.4 * 1.852).abs() < 1e-9);
        assert_eq!(fix.timestamp, 5.0);
    }

    #[test]
    fn test_southern_western_hemispheres_negate() {
        let line = "$GNRMC,010101,A,3351.000,S,15112.000,W,0.0,0.0,010120,,";
        let fix = parse_rmc(line, 0.0).unwrap();
        assert!(fix.lat < 0.0);
        assert!(fix.lon < 0.0);
        assert!((fix.lat + (33.0 + 51.0 / 60.0)).abs() < 1e-9);
        assert_eq!(fix.speed, 0.0);
    }

    #[test]
    fn test_rejected_sentences() {
        // void fix
        assert!(parse_rmc("$GPRMC,123519,V,,,,,,,230394,,", 0.0).is_none());
        // other sentence type
        assert!(parse_rmc("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M", 0.0).is_none());
        // bad checksum
        assert!(parse_rmc(&FIX.replace("*6A", "*00"), 0.0).is_none());
        // unknown hemisphere
        assert!(parse_rmc("$GPRMC,1,A,4807.038,X,01131.000,E,1.0", 0.0).is_none());
    }

    #[tokio::test]
    async fn test_reader_ingests_fixes() {
        let hub = SensorHub::with_defaults();
        let input = format!("$GPRMC,1,V,,,,,,,,,\r\n{FIX}\r\ngarbage\r\n{FIX}\r\n");
        read_sentences(input.as_bytes(), hub.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hub.position.len(), 2);
    }

    #[tokio::test]
    async fn test_reader_skips_non_utf8_line() {
        let hub = SensorHub::with_defaults();
        let mut input = b"$GPRMC,\xff\xfe garbage\r\n".to_vec();
        input.extend_from_slice(FIX.as_bytes());
        input.extend_from_slice(b"\r\n");

        read_sentences(input.as_slice(), hub.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hub.position.len(), 1);
        assert_eq!(hub.session().stats().dropped_frames, 1);
    }
}
