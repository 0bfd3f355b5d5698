//! Operator toggle flags.
//!
//! Three integer flags the operator flips during a drive (for example
//! "nauseous", "uncomfortable", "anxious"). The logger only passes them
//! through. A running logger picks up changes from `toggles.json`, which the
//! `toggle` subcommand writes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Number of operator flags.
pub const TOGGLE_COUNT: usize = 3;

/// Lock-free flag storage shared between the file watcher and the scheduler.
#[derive(Debug, Default)]
pub struct ToggleState {
    flags: [AtomicI32; TOGGLE_COUNT],
}

pub type SharedToggleState = Arc<ToggleState>;

impl ToggleState {
    pub fn shared() -> SharedToggleState {
        Arc::new(Self::default())
    }

    /// Set one flag. Out-of-range indices are ignored.
    pub fn set(&self, index: usize, value: i32) {
        if let Some(flag) = self.flags.get(index) {
            flag.store(value, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> [i32; TOGGLE_COUNT] {
        [
            self.flags[0].load(Ordering::Relaxed),
            self.flags[1].load(Ordering::Relaxed),
            self.flags[2].load(Ordering::Relaxed),
        ]
    }

    /// Replace all flags with the contents of a toggle file.
    pub fn apply(&self, file: &ToggleFile) {
        for (i, value) in file.flags.iter().enumerate() {
            self.set(i, *value);
        }
    }
}

/// On-disk toggle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleFile {
    pub flags: [i32; TOGGLE_COUNT],
}

impl ToggleFile {
    /// Read a toggle file; a missing file means every flag is off.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
