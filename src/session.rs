use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Request lifecycle for the single in-flight exchange.
///
/// `Awaiting` carries the instant of the last channel activity for the
/// request so the stall clock measures silence, not total duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// No request in flight
    Idle,
    /// A user turn was submitted and its answer has not completed
    Awaiting { last_activity: Instant },
    /// The stall window elapsed; the user decides between resume and cancel
    Stalled,
}

/// Per-connection session state read atomically by the reconciler.
///
/// One instance exists per active connection; it is reset when the
/// connection is re-established. The selected model survives resets — it
/// is persisted externally by the config layer.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: RequestPhase,
    /// Channel liveness as reported by Connected/Disconnected events
    pub connected: bool,
    /// Currently selected model identifier
    pub active_model: String,
    /// Uploaded-file reference supplied by the host, read by every submission
    pub file_ref: Option<String>,
}

impl SessionState {
    pub fn new(active_model: impl Into<String>, file_ref: Option<String>) -> Self {
        Self {
            phase: RequestPhase::Idle,
            connected: true,
            active_model: active_model.into(),
            file_ref,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// True between an accepted submission and its paired completion.
    pub fn awaiting_response(&self) -> bool {
        !matches!(self.phase, RequestPhase::Idle)
    }

    /// True while the stall decision is pending.
    pub fn timed_out(&self) -> bool {
        matches!(self.phase, RequestPhase::Stalled)
    }

    /// Accepted submission: Idle -> Awaiting.
    pub fn begin_request(&mut self, now: Instant) {
        self.phase = RequestPhase::Awaiting { last_activity: now };
    }

    /// Channel activity for the in-flight request. Refreshes the stall
    /// clock while awaiting; a pending stall decision is not revoked by a
    /// fragment alone — only completion, resume or cancel leave `Stalled`.
    pub fn note_activity(&mut self, now: Instant) {
        if let RequestPhase::Awaiting { last_activity } = &mut self.phase {
            *last_activity = now;
        }
    }

    /// Completion applied (or explicit cancel): back to Idle.
    pub fn finish_request(&mut self) {
        if self.phase != RequestPhase::Idle {
            debug!("request finished, session idle");
        }
        self.phase = RequestPhase::Idle;
    }

    /// Declare a stall. Only meaningful while awaiting; duplicate or late
    /// stall signals are absorbed.
    pub fn declare_stall(&mut self) -> bool {
        match self.phase {
            RequestPhase::Awaiting { .. } => {
                warn!("request stalled, awaiting user decision");
                self.phase = RequestPhase::Stalled;
                true
            }
            _ => false,
        }
    }

    /// Resume after a stall: Stalled -> Awaiting with a fresh clock.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.timed_out() {
            self.phase = RequestPhase::Awaiting { last_activity: now };
            true
        } else {
            false
        }
    }

    /// Local stall detection, driven by the host timer. Transitions
    /// Awaiting -> Stalled once `window` elapses without channel activity
    /// and reports whether the transition happened on this check.
    pub fn check_stall(&mut self, now: Instant, window: Duration) -> bool {
        match self.phase {
            RequestPhase::Awaiting { last_activity }
                if now.duration_since(last_activity) >= window =>
            {
                self.declare_stall()
            }
            _ => false,
        }
    }

    /// Connection re-established: fresh session, same model selection.
    pub fn reconnect(&mut self) {
        self.phase = RequestPhase::Idle;
        self.connected = true;
    }
}
