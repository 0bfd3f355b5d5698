//! The fixed-schema summary row emitted once per tick.

use crate::collector::types::{BLENDSHAPE_COUNT, BLENDSHAPE_NAMES};
use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Leading columns that are not numeric metrics.
pub const LEADING_COLUMNS: [&str; 4] = ["timestamp", "toggle_0", "toggle_1", "toggle_2"];

/// Metric columns, in output order.
pub const METRIC_COLUMNS: [&str; 14] = [
    "speed",
    "trajectory",
    "acc_rms_x",
    "acc_rms_y",
    "acc_rms_z",
    "gyro_rms_x",
    "gyro_rms_y",
    "gyro_rms_z",
    "heart_rate",
    "r",
    "g",
    "b",
    "head_linear_velocity",
    "head_angular_velocity",
];

/// Total number of columns in a row.
pub const COLUMN_COUNT: usize = LEADING_COLUMNS.len() + METRIC_COLUMNS.len() + BLENDSHAPE_COUNT;

/// Timestamp format used in tabular output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derived metrics for one tick. Everything defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowMetrics {
    /// Mean GPS speed, km/h
    pub speed: f64,
    /// Lon/lat linearity, 0..=1
    pub trajectory: f64,
    pub acc_rms: [f64; 3],
    pub gyro_rms: [f64; 3],
    /// Smoothed BPM
    pub heart_rate: f64,
    pub rgb: [f64; 3],
    pub head_linear_velocity: f64,
    /// Degrees per second
    pub head_angular_velocity: f64,
}

impl RowMetrics {
    /// Values in `METRIC_COLUMNS` order.
    pub fn values(&self) -> [f64; METRIC_COLUMNS.len()] {
        [
            self.speed,
            self.trajectory,
            self.acc_rms[0],
            self.acc_rms[1],
            self.acc_rms[2],
            self.gyro_rms[0],
            self.gyro_rms[1],
            self.gyro_rms[2],
            self.heart_rate,
            self.rgb[0],
            self.rgb[1],
            self.rgb[2],
            self.head_linear_velocity,
            self.head_angular_velocity,
        ]
    }
}

/// One output record. Never mutated after it is handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: DateTime<Local>,
    /// Operator flags, passed through unchanged
    pub toggles: [i32; 3],
    pub metrics: RowMetrics,
    /// Per-key means, in `BLENDSHAPE_NAMES` order
    pub blendshapes: [f64; BLENDSHAPE_COUNT],
}

impl Row {
    /// A row with every numeric column at its default.
    pub fn empty(timestamp: DateTime<Local>, toggles: [i32; 3]) -> Self {
        Self {
            timestamp,
            toggles,
            metrics: RowMetrics::default(),
            blendshapes: [0.0; BLENDSHAPE_COUNT],
        }
    }

    /// Column names in output order.
    pub fn column_names() -> Vec<&'static str> {
        LEADING_COLUMNS
            .iter()
            .chain(METRIC_COLUMNS.iter())
            .chain(BLENDSHAPE_NAMES.iter())
            .copied()
            .collect()
    }

    /// Metric and blendshape values in output order.
    pub fn numeric_values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(METRIC_COLUMNS.len() + BLENDSHAPE_COUNT);
        values.extend_from_slice(&self.metrics.values());
        values.extend_from_slice(&self.blendshapes);
        values
    }

    /// Look up a numeric column by name.
    pub fn value(&self, column: &str) -> Option<f64> {
        METRIC_COLUMNS
            .iter()
            .chain(BLENDSHAPE_NAMES.iter())
            .position(|&c| c == column)
            .map(|idx| self.numeric_values()[idx])
    }

    /// All columns rendered as text, in output order.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(COLUMN_COUNT);
        record.push(self.timestamp.format(TIMESTAMP_FORMAT).to_string());
        record.extend(self.toggles.iter().map(i32::to_string));
        record.extend(self.numeric_values().iter().map(|v| format_value(*v)));
        record
    }
}

/// Non-finite values never reach a sink.
fn format_value(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        "0".to_string()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT))?;
        map.serialize_entry("timestamp", &self.timestamp.to_rfc3339())?;
        for (name, toggle) in LEADING_COLUMNS[1..].iter().zip(&self.toggles) {
            map.serialize_entry(name, toggle)?;
        }
        let names = METRIC_COLUMNS.iter().chain(BLENDSHAPE_NAMES.iter());
        for (name, value) in names.zip(self.numeric_values()) {
            let value = if value.is_finite() { value } else { 0.0 };
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_layout() {
        let names = Row::column_names();
        assert_eq!(names.len(), COLUMN_COUNT);
        assert_eq!(
            &names[..6],
            &["timestamp", "toggle_0", "toggle_1", "toggle_2", "speed", "trajectory"]
        );
        assert_eq!(names[17], "head_angular_velocity");
        assert_eq!(names[18], "_neutral");
        assert_eq!(*names.last().unwrap(), "noseSneerRight");
    }

    #[test]
    fn test_empty_row_has_every_column() {
        let row = Row::empty(Local::now(), [1, 0, 1]);
        let record = row.to_record();
        assert_eq!(record.len(), COLUMN_COUNT);
        assert_eq!(&record[1..4], &["1", "0", "1"]);
        assert!(record[4..].iter().all(|v| v == "0"));
    }

    #[test]
    fn test_json_keeps_column_order() {
        let mut row = Row::empty(Local::now(), [0, 0, 0]);
        row.metrics.heart_rate = 71.5;
        row.metrics.speed = f64::NAN;

        let json = serde_json::to_string(&row).unwrap();
        let speed_pos = json.find("\"speed\"").unwrap();
        let hr_pos = json.find("\"heart_rate\"").unwrap();
        assert!(speed_pos < hr_pos);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), COLUMN_COUNT);
        assert_eq!(value["heart_rate"], 71.5);
        assert_eq!(value["speed"], 0.0);
    }

    #[test]
    fn test_value_lookup() {
        let mut row = Row::empty(Local::now(), [0, 0, 0]);
        row.metrics.acc_rms = [1.0, 2.0, 3.0];
        row.blendshapes[25] = 0.4;
        assert_eq!(row.value("acc_rms_y"), Some(2.0));
        assert_eq!(row.value("jawOpen"), Some(0.4));
        assert_eq!(row.value("toggle_0"), None);
    }
}
