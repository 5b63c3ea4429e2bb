use serde::Serialize;

/// Inbound events delivered by the channel, shape only — the transport
/// behind them is free to coalesce partials into any granularity.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// An incremental fragment of the in-flight bot answer
    Partial { text: String },

    /// The in-flight answer finished; carries response time and the model
    /// that actually produced the answer
    Complete { elapsed_seconds: f64, model_id: String },

    /// The backend declared the request stalled (a local timer may derive
    /// the same event without a server push)
    StallDetected,

    /// Transport-level error, surfaced as a non-fatal notice
    ChannelError { message: String },

    /// Connection (re-)established
    Connected,

    /// Connection lost
    Disconnected { reason: String },
}

/// Outbound requests produced by the reconciliation core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundRequest {
    /// A new user turn
    SubmitMessage {
        text: String,
        #[serde(rename = "model")]
        model_id: String,
        #[serde(rename = "file", skip_serializing_if = "Option::is_none")]
        file_ref: Option<String>,
    },

    /// Re-issue of the last user turn after a stall (no new turn is created)
    ContinueRequest {
        text: String,
        #[serde(rename = "model")]
        model_id: String,
        #[serde(rename = "file", skip_serializing_if = "Option::is_none")]
        file_ref: Option<String>,
    },
}

impl OutboundRequest {
    /// Text payload carried by the request.
    pub fn text(&self) -> &str {
        match self {
            OutboundRequest::SubmitMessage { text, .. } => text,
            OutboundRequest::ContinueRequest { text, .. } => text,
        }
    }

    /// Model identifier the request targets.
    pub fn model_id(&self) -> &str {
        match self {
            OutboundRequest::SubmitMessage { model_id, .. } => model_id,
            OutboundRequest::ContinueRequest { model_id, .. } => model_id,
        }
    }

    /// True for resume-after-stall requests.
    pub fn is_continuation(&self) -> bool {
        matches!(self, OutboundRequest::ContinueRequest { .. })
    }
}
