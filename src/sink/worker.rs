//! Dedicated writer thread between the scheduler and the sinks.

use super::RowSink;
use crate::core::row::Row;
use crate::session::SharedSessionLog;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::thread::{self, JoinHandle};

/// Sending half handed to the scheduler. Never blocks.
#[derive(Debug, Clone)]
pub struct RowSender {
    tx: Sender<Row>,
    session: SharedSessionLog,
}

impl RowSender {
    /// Queue a row for writing. Returns false if the row was dropped.
    pub fn submit(&self, row: Row) -> bool {
        match self.tx.try_send(row) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("sink queue full, dropping row");
                self.session.record_row_dropped();
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("sink thread gone, dropping row");
                self.session.record_row_dropped();
                false
            }
        }
    }
}

/// Owns the writer thread. Dropping every [`RowSender`] and calling
/// [`SinkWorker::shutdown`] drains the queue and joins the thread.
pub struct SinkWorker {
    sender: RowSender,
    handle: JoinHandle<()>,
}

impl SinkWorker {
    pub fn spawn(
        sinks: Vec<Box<dyn RowSink>>,
        queue: usize,
        session: SharedSessionLog,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded(queue.max(1));
        let thread_session = session.clone();
        let handle = thread::Builder::new()
            .name("row-sink".into())
            .spawn(move || drain(rx, sinks, thread_session))?;

        Ok(Self {
            sender: RowSender { tx, session },
            handle,
        })
    }

    pub fn sender(&self) -> RowSender {
        self.sender.clone()
    }

    /// Close the queue and wait for queued rows to be written.
    pub fn shutdown(self) {
        drop(self.sender);
        if self.handle.join().is_err() {
            tracing::error!("sink thread panicked");
        }
    }
}

fn drain(rx: Receiver<Row>, mut sinks: Vec<Box<dyn RowSink>>, session: SharedSessionLog) {
    for row in rx.iter() {
        let mut written = false;
        for sink in sinks.iter_mut() {
            match sink.write_row(&row).and_then(|()| sink.flush()) {
                Ok(()) => written = true,
                Err(e) => tracing::warn!(sink = sink.name(), "failed to write row: {e}"),
            }
        }
        if written {
            session.record_row_emitted();
        }
    }

    for sink in sinks.iter_mut() {
        if let Err(e) = sink.flush() {
            tracing::warn!(sink = sink.name(), "final flush failed: {e}");
        }
    }
    tracing::debug!("sink thread finished");
}
