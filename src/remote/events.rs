//! Live progress channel: newline-delimited JSON events from the service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{CLIENT_ID_HEADER, build_http_client};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// An event pushed by the service, keyed by output filename.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PushEvent {
    Error {
        filename: String,
        error: String,
    },
    Progress {
        filename: String,
        progress: f64,
        #[serde(default)]
        speed: Option<serde_json::Value>,
        #[serde(default)]
        eta: Option<serde_json::Value>,
    },
}

impl PushEvent {
    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::Error { filename, .. } | Self::Progress { filename, .. } => filename,
        }
    }

    /// Human-readable speed/eta suffix of a progress event, if any.
    #[must_use]
    pub fn extra(&self) -> Option<String> {
        let Self::Progress { speed, eta, .. } = self else {
            return None;
        };
        let render = |v: &serde_json::Value| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let parts: Vec<String> = [
            speed.as_ref().map(|s| format!("speed {}", render(s))),
            eta.as_ref().map(|e| format!("eta {}", render(e))),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Takes every complete line out of `buf` and decodes it.
///
/// A trailing partial line stays in `buf`. Blank lines are skipped and
/// undecodable frames are logged and dropped.
pub fn drain_frames(buf: &mut Vec<u8>) -> Vec<PushEvent> {
    let mut events = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<PushEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => log::warn!("Dropping undecodable push frame: {e}"),
        }
    }
    events
}

/// Identity and liveness of the live progress channel.
///
/// The client id is sent with download requests so the service can route
/// events back to this client.
#[derive(Debug, Clone)]
pub struct PushChannel {
    client_id: String,
    ready: Arc<AtomicBool>,
}

impl PushChannel {
    /// Creates a channel identity that is not connected yet.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// True while the event stream is open.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the channel connected or disconnected.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Opens `GET /api/events` and forwards decoded events until the stream
    /// ends. A fresh client id is generated when `client_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the service cannot be reached and
    /// [`Error::Server`] if it refuses the subscription.
    pub async fn connect(
        config: &ClientConfig,
        client_id: Option<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PushEvent>)> {
        let channel = Self::new(client_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()));
        // No overall timeout: the stream is long-lived.
        let http = build_http_client(None, config.connect_timeout())?;

        let response = http
            .get(format!("{}/api/events", config.base_url()))
            .header(CLIENT_ID_HEADER, channel.client_id())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Server {
                status: status.as_u16(),
                message: format!("Live channel refused (status {})", status.as_u16()),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        channel.set_ready(true);
        log::info!("Live channel connected as {}", channel.client_id());

        let liveness = channel.clone();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf = Vec::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        buf.extend_from_slice(&chunk);
                        for event in drain_frames(&mut buf) {
                            if tx.send(event).is_err() {
                                liveness.set_ready(false);
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("Live channel read failed: {e}");
                        break;
                    }
                }
            }
            liveness.set_ready(false);
            log::info!("Live channel closed");
        });

        Ok((channel, rx))
    }
}
