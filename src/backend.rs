use futures::StreamExt;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::channel::{Channel, ChannelError, SubscriberRegistry, Subscription};
use crate::events::{ChannelEvent, OutboundRequest};

/// Wire events pushed by the backend, one JSON object per line.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    /// Incremental answer fragment
    Response { response: String },
    /// Answer finished; response time and producing model
    ResponseTime { time: f64, model: String },
    /// Backend-side stall notice
    Timeout {
        #[serde(default)]
        message: String,
    },
    /// Backend-side error
    Error { error: String },
}

fn map_wire_event(event: WireEvent) -> ChannelEvent {
    match event {
        WireEvent::Response { response } => ChannelEvent::Partial { text: response },
        WireEvent::ResponseTime { time, model } => ChannelEvent::Complete {
            elapsed_seconds: time,
            model_id: model,
        },
        WireEvent::Timeout { message } => {
            debug!(%message, "backend declared a timeout");
            ChannelEvent::StallDetected
        }
        WireEvent::Error { error } => ChannelEvent::ChannelError { message: error },
    }
}

/// Parse one newline-delimited wire line. Blank lines and unknown shapes
/// yield nothing — benign protocol noise is absorbed, not surfaced.
fn parse_wire_line(line: &str) -> Option<ChannelEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<WireEvent>(line) {
        Ok(event) => Some(map_wire_event(event)),
        Err(err) => {
            debug!(%err, line, "skipping malformed wire line");
            None
        }
    }
}

/// Streaming HTTP client for the document-QA backend.
///
/// Each outbound request is posted from a background task; the response
/// body is a stream of newline-delimited JSON events that are fanned out
/// to subscribers as they arrive. One client owns one logical connection,
/// identified to the backend by a per-process session id.
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
    registry: SubscriberRegistry,
    session_id: Uuid,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            registry: SubscriberRegistry::new(),
            session_id: Uuid::new_v4(),
        })
    }

    /// Probe the backend once and report liveness to subscribers.
    pub fn probe(&self) {
        let client = self.client.clone();
        let url = self.base_url.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            match client.get(&url).send().await {
                Ok(_) => registry.publish(ChannelEvent::Connected),
                Err(err) => registry.publish(ChannelEvent::Disconnected {
                    reason: err.to_string(),
                }),
            }
        });
    }

    fn endpoint(&self, request: &OutboundRequest) -> String {
        let path = if request.is_continuation() {
            "continue_request"
        } else {
            "message"
        };
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn stream_events(
        client: reqwest::Client,
        url: String,
        payload: serde_json::Value,
        registry: SubscriberRegistry,
    ) -> Result<(), ChannelError> {
        let response = client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            registry.publish(ChannelEvent::ChannelError {
                message: format!("backend error {status}: {body}"),
            });
            return Ok(());
        }

        // a stream opened: the connection is demonstrably alive
        registry.publish(ChannelEvent::Connected);

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // hand over complete lines, keep the partial tail buffered
            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].to_string();
                buffer = buffer[newline_pos + 1..].to_string();
                if let Some(event) = parse_wire_line(&line) {
                    registry.publish(event);
                }
            }
        }

        // flush a final line that arrived without a trailing newline
        if let Some(event) = parse_wire_line(&buffer) {
            registry.publish(event);
        }
        Ok(())
    }
}

impl Channel for BackendClient {
    fn send(&self, request: OutboundRequest) -> Result<(), ChannelError> {
        let url = self.endpoint(&request);
        let mut payload = serde_json::to_value(&request)
            .map_err(|err| ChannelError::Protocol(err.to_string()))?;
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "session".to_string(),
                serde_json::Value::String(self.session_id.to_string()),
            );
        }

        let client = self.client.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(err) = Self::stream_events(client, url, payload, registry.clone()).await {
                warn!(%err, "request stream failed");
                registry.publish(ChannelEvent::Disconnected {
                    reason: err.to_string(),
                });
            }
        });
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }
}
