//! TCP listener for the face tracker.
//!
//! The tracker connects and streams one JSON object per line. Each line is
//! validated into a [`FaceUpdate`] and handed to the hub; malformed lines
//! are dropped and counted.

use crate::collector::read_raw_line;
use crate::collector::types::{FaceFrame, FaceUpdate, SensorEvent};
use crate::core::hub::SensorHub;
use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct FaceListener {
    listener: TcpListener,
    hub: SensorHub,
}

impl FaceListener {
    pub async fn bind(addr: &str, hub: SensorHub) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, hub })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept tracker connections until cancelled, then wait for every open
    /// connection to finish.
    pub async fn run(self, cancel: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "waiting for face tracker"),
            Err(e) => tracing::warn!("face listener has no local address: {e}"),
        }

        let mut connections = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
                Some(done) = connections.join_next() => {
                    if let Err(e) = done {
                        tracing::warn!("face connection task failed: {e}");
                    }
                    continue;
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "face tracker connected");
                    let hub = self.hub.clone();
                    let cancel = cancel.child_token();
                    connections.spawn(async move {
                        serve_connection(stream, hub, cancel).await;
                        tracing::info!(%peer, "face tracker disconnected");
                    });
                }
                Err(e) => tracing::warn!("accept failed: {e}"),
            }
        }

        while let Some(done) = connections.join_next().await {
            if let Err(e) = done {
                tracing::warn!("face connection task failed: {e}");
            }
        }
        tracing::debug!("face listener stopped");
    }
}

async fn serve_connection(stream: TcpStream, hub: SensorHub, cancel: CancellationToken) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = read_raw_line(&mut reader, &mut buf) => next,
        };

        match next {
            Ok(true) => match std::str::from_utf8(&buf) {
                Ok(line) => handle_line(&hub, line),
                Err(e) => hub.reject(&format_args!("face frame is not UTF-8: {e}")),
            },
            Ok(false) => break,
            Err(e) => {
                tracing::warn!("face stream read failed: {e}");
                break;
            }
        }
    }
}

/// Parse one wire line and route it. Blank lines are ignored.
pub fn handle_line(hub: &SensorHub, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match FaceFrame::parse(line).and_then(FaceFrame::into_update) {
        Ok(update) => {
            if matches!(update, FaceUpdate::Lost) {
                tracing::debug!("tracker reports no face");
            }
            hub.ingest(SensorEvent::Face(update));
        }
        Err(e) => hub.reject(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const FRAME: &str = r#"{"timestamp": 1.0, "avg_rgb": [120.0, 90.0, 80.0], "blendshapes": {"jawOpen": 0.3}}"#;

    #[test]
    fn test_lines_route_to_hub() {
        let hub = SensorHub::with_defaults();
        handle_line(&hub, FRAME);
        handle_line(&hub, "");
        handle_line(&hub, "{not json");
        handle_line(&hub, r#"{"timestamp": 2.0, "avg_rgb": [1.0, 2.0]}"#);

        assert_eq!(hub.face.len(), 1);
        let stats = hub.session().stats();
        assert_eq!(stats.face_samples, 1);
        assert_eq!(stats.dropped_frames, 2);
    }

    #[test]
    fn test_empty_frame_clears_history() {
        let hub = SensorHub::with_defaults();
        handle_line(&hub, FRAME);
        handle_line(&hub, FRAME);
        handle_line(&hub, r#"{"timestamp": 3.0}"#);

        assert!(hub.face.is_empty());
        assert_eq!(hub.session().stats().face_lost, 1);
    }

    #[tokio::test]
    async fn test_listener_ingests_stream() {
        let hub = SensorHub::with_defaults();
        let listener = FaceListener::bind("127.0.0.1:0", hub.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let payload = format!("{FRAME}\n{FRAME}\n");
        client.write_all(payload.as_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while hub.face.len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.face.len(), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_survives_non_utf8_line() {
        let hub = SensorHub::with_defaults();
        let listener = FaceListener::bind("127.0.0.1:0", hub.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut payload = b"{\"timestamp\": \xff\xfe}\n".to_vec();
        payload.extend_from_slice(format!("{FRAME}\n{FRAME}\n").as_bytes());
        client.write_all(&payload).await.unwrap();
        client.flush().await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while hub.face.len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.face.len(), 2);
        assert_eq!(hub.session().stats().dropped_frames, 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_waits_for_open_connections() {
        let hub = SensorHub::with_defaults();
        let listener = FaceListener::bind("127.0.0.1:0", hub.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(format!("{FRAME}\n").as_bytes()).await.unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while hub.face.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // The client stays connected; cancellation must still end the run.
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("listener did not stop")
            .unwrap();
        assert_eq!(hub.face.len(), 1);
        drop(client);
    }
}
