//! Session bookkeeping: what was ingested, dropped and written.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, PersistedStats, SessionLog,
    SessionStats, SharedSessionLog,
};
