use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::channel::Channel;
use crate::events::{ChannelEvent, OutboundRequest};
use crate::gate::can_submit;
use crate::session::SessionState;
use crate::transcript::{Sender, Transcript, Turn};

/// Applies inbound channel events to the transcript and owns the session
/// state for the single in-flight request.
///
/// The channel is an injected dependency; the host event loop drives this
/// type exclusively through `&mut self`, which serializes every mutation.
/// Nothing here is fatal — malformed or late events degrade to no-ops and
/// the transcript is always left in its last consistent shape.
pub struct Reconciler<C: Channel> {
    transcript: Transcript,
    session: SessionState,
    channel: C,
    stall_window: Duration,
    notice: Option<String>,
}

impl<C: Channel> Reconciler<C> {
    pub fn new(channel: C, session: SessionState, stall_window: Duration) -> Self {
        Self {
            transcript: Transcript::new(),
            session,
            channel,
            stall_window,
            notice: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Host-side writes to the shared selection state (model, file).
    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Whether `submit` would currently accept this input.
    pub fn can_submit(&self, input: &str) -> bool {
        can_submit(input, &self.transcript, &self.session)
    }

    /// Submit a new user turn. Gate check, append and outbound send happen
    /// in one synchronous step; a gated submission is silently rejected.
    /// Returns whether the turn was accepted.
    pub fn submit(&mut self, input: &str) -> bool {
        if !self.can_submit(input) {
            debug!("submission rejected by input gate");
            return false;
        }
        let text = input.trim().to_string();

        self.transcript.append(Turn::user(text.clone()));
        self.session.begin_request(Instant::now());

        let request = OutboundRequest::SubmitMessage {
            text,
            model_id: self.session.active_model.clone(),
            file_ref: self.session.file_ref.clone(),
        };
        if let Err(err) = self.channel.send(request) {
            warn!(%err, "outbound send failed");
            self.notice = Some(err.to_string());
        }
        true
    }

    /// Apply one inbound event.
    pub fn apply(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Partial { text } => self.on_partial(text),
            ChannelEvent::Complete { elapsed_seconds, model_id } => {
                self.on_completion(elapsed_seconds, model_id)
            }
            ChannelEvent::StallDetected => {
                self.session.declare_stall();
            }
            ChannelEvent::ChannelError { message } => {
                warn!(%message, "channel error");
                self.notice = Some(message);
            }
            ChannelEvent::Connected => self.on_connected(),
            ChannelEvent::Disconnected { reason } => {
                warn!(%reason, "channel disconnected");
                self.session.connected = false;
                self.notice = Some(format!("connection lost: {reason}"));
            }
        }
    }

    /// Local stall detection; returns true if the session transitioned to
    /// the stalled state on this tick.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.session.check_stall(now, self.stall_window)
    }

    /// Resume a stalled request: re-send the last user turn's text as a
    /// continuation with the current model and file context. The
    /// transcript is not touched. Returns whether a continuation went out.
    pub fn resume(&mut self) -> bool {
        if !self.session.timed_out() {
            return false;
        }
        let Some(text) = self.transcript.last_user_text().map(str::to_string) else {
            // stalled with no user turn on record; nothing to re-send
            self.session.finish_request();
            return false;
        };

        self.session.resume(Instant::now());
        let request = OutboundRequest::ContinueRequest {
            text,
            model_id: self.session.active_model.clone(),
            file_ref: self.session.file_ref.clone(),
        };
        if let Err(err) = self.channel.send(request) {
            warn!(%err, "continuation send failed");
            self.notice = Some(err.to_string());
        }
        true
    }

    /// Cancel a stalled request: discard the stalled exchange so the
    /// transcript returns to its pre-submission shape, then go idle.
    pub fn cancel(&mut self) {
        if !self.session.timed_out() {
            return;
        }
        if self.transcript.last().is_some_and(Turn::is_streaming_bot) {
            self.transcript.truncate_last();
        }
        if self
            .transcript
            .last()
            .is_some_and(|t| t.sender == Sender::User)
        {
            self.transcript.truncate_last();
        }
        self.session.finish_request();
    }

    /// Start a new chat session: empty transcript, idle session, same
    /// model selection.
    pub fn reset(&mut self) {
        self.transcript.reset();
        self.session.finish_request();
        self.notice = None;
    }

    /// Take the pending user-facing notice, if any.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    fn on_partial(&mut self, text: String) {
        let coalesced = self
            .transcript
            .update_last(Turn::is_streaming_bot, |t| t.text.push_str(&text));
        if coalesced {
            self.session.note_activity(Instant::now());
            return;
        }
        if !self.session.awaiting_response() {
            // no prior submission (or the exchange was cancelled): benign
            // duplicate delivery, absorbed
            debug!("dropping stale partial event");
            return;
        }
        self.transcript.append(Turn::bot(text));
        self.session.note_activity(Instant::now());
    }

    fn on_completion(&mut self, elapsed_seconds: f64, model_id: String) {
        let applied = self.transcript.update_last(Turn::is_streaming_bot, |t| {
            let trimmed = t.text.trim().to_string();
            t.text = trimmed;
            t.complete = true;
            t.elapsed_seconds = Some(elapsed_seconds);
            t.model_id = Some(model_id);
        });
        if applied {
            // a late completion also clears a declared stall
            self.session.finish_request();
        } else {
            debug!("completion with no pending bot turn, ignored");
        }
    }

    fn on_connected(&mut self) {
        if self.session.connected {
            return;
        }
        if self.session.awaiting_response() {
            // the in-flight request rode the dead connection; hand the
            // resume/cancel decision to the user instead of guessing
            self.session.connected = true;
            self.session.declare_stall();
        } else {
            self.session.reconnect();
        }
        self.notice = Some("connection re-established".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;

    const WINDOW: Duration = Duration::from_secs(40);

    fn reconciler() -> (Reconciler<LoopbackChannel>, LoopbackChannel) {
        let channel = LoopbackChannel::new();
        let session = SessionState::new("Lama3.1", None);
        (Reconciler::new(channel.clone(), session, WINDOW), channel)
    }

    fn complete(elapsed: f64, model: &str) -> ChannelEvent {
        ChannelEvent::Complete {
            elapsed_seconds: elapsed,
            model_id: model.to_string(),
        }
    }

    #[test]
    fn full_exchange_produces_a_paired_transcript() {
        let (mut r, channel) = reconciler();

        assert!(r.submit("Welches Thema hat diese Bachelorarbeit?"));
        r.apply(ChannelEvent::Partial { text: "Die".into() });
        r.apply(ChannelEvent::Partial { text: " Arbeit".into() });
        r.apply(ChannelEvent::Partial { text: " behandelt...".into() });
        r.apply(complete(3.2, "Lama3.1"));

        let turns = r.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].sender, Sender::User);
        assert_eq!(turns[0].text, "Welches Thema hat diese Bachelorarbeit?");
        assert_eq!(turns[1].sender, Sender::Bot);
        assert_eq!(turns[1].text, "Die Arbeit behandelt...");
        assert!(turns[1].complete);
        assert_eq!(turns[1].elapsed_seconds, Some(3.2));
        assert_eq!(turns[1].model_id.as_deref(), Some("Lama3.1"));
        assert!(!r.session().awaiting_response());

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(channel.sent()[0].text(), "Welches Thema hat diese Bachelorarbeit?");
    }

    #[test]
    fn partials_coalesce_regardless_of_granularity() {
        let (mut r, _channel) = reconciler();
        r.submit("q");

        // one event carrying the entire answer behaves like many tokens
        r.apply(ChannelEvent::Partial { text: "the whole answer".into() });
        assert_eq!(r.transcript().len(), 2);
        assert_eq!(r.transcript().last().unwrap().text, "the whole answer");

        r.apply(ChannelEvent::Partial { text: " and more".into() });
        assert_eq!(r.transcript().len(), 2);
        assert_eq!(r.transcript().last().unwrap().text, "the whole answer and more");
    }

    #[test]
    fn at_most_one_incomplete_turn_and_it_is_last() {
        let (mut r, _channel) = reconciler();
        r.submit("q");
        r.apply(ChannelEvent::Partial { text: "a".into() });
        r.apply(ChannelEvent::Partial { text: "b".into() });

        let incomplete: Vec<_> = r
            .transcript()
            .turns()
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.complete)
            .collect();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].0, r.transcript().len() - 1);
    }

    #[test]
    fn completion_trims_whitespace_and_is_idempotent() {
        let (mut r, _channel) = reconciler();
        r.submit("q");
        r.apply(ChannelEvent::Partial { text: "  answer \n".into() });
        r.apply(complete(1.5, "DeepSeek"));

        let snapshot = r.transcript().turns().to_vec();
        assert_eq!(snapshot[1].text, "answer");

        // duplicate delivery: second application is a no-op
        r.apply(complete(9.9, "Mistral"));
        let after = r.transcript().turns();
        assert_eq!(after.len(), snapshot.len());
        assert_eq!(after[1].text, "answer");
        assert_eq!(after[1].elapsed_seconds, Some(1.5));
        assert_eq!(after[1].model_id.as_deref(), Some("DeepSeek"));
    }

    #[test]
    fn completion_without_pending_bot_turn_is_ignored() {
        let (mut r, _channel) = reconciler();
        r.apply(complete(1.0, "Lama3.1"));
        assert!(r.transcript().is_empty());

        // still awaiting: no partial arrived yet, so nothing to stamp
        r.submit("q");
        r.apply(complete(1.0, "Lama3.1"));
        assert_eq!(r.transcript().len(), 1);
        assert!(r.session().awaiting_response());
    }

    #[test]
    fn stale_partial_after_reset_is_dropped() {
        let (mut r, _channel) = reconciler();
        r.submit("q");
        r.reset();

        r.apply(ChannelEvent::Partial { text: "ghost".into() });
        assert!(r.transcript().is_empty());
    }

    #[test]
    fn gate_closes_after_submission_and_reopens_on_completion() {
        let (mut r, channel) = reconciler();
        assert!(r.submit("first"));
        assert!(!r.can_submit("second"));
        assert!(!r.submit("second"));
        assert_eq!(channel.sent().len(), 1);

        r.apply(ChannelEvent::Partial { text: "streaming".into() });
        assert!(!r.can_submit("second"));

        r.apply(complete(0.8, "Lama3.1"));
        assert!(r.can_submit("second"));
    }

    #[test]
    fn stall_then_resume_re_sends_the_user_text_unchanged() {
        let (mut r, channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::StallDetected);
        assert!(r.session().timed_out());
        assert_eq!(r.transcript().len(), 1);

        assert!(r.resume());
        assert!(!r.session().timed_out());
        assert!(r.session().awaiting_response());
        assert_eq!(r.transcript().len(), 1);

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].is_continuation());
        assert_eq!(sent[1].text(), "Q");
        assert_eq!(sent[1].model_id(), "Lama3.1");
    }

    #[test]
    fn resume_uses_the_user_turn_even_with_a_partial_answer_on_screen() {
        let (mut r, channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::Partial { text: "half an ans".into() });
        r.apply(ChannelEvent::StallDetected);

        assert!(r.resume());
        let sent = channel.sent();
        assert_eq!(sent[1].text(), "Q");
    }

    #[test]
    fn stall_then_cancel_restores_the_pre_submission_shape() {
        let (mut r, _channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::StallDetected);

        r.cancel();
        assert!(r.transcript().is_empty());
        assert!(!r.session().awaiting_response());
        assert!(r.can_submit("again"));
    }

    #[test]
    fn cancel_mid_stream_also_discards_the_partial_answer() {
        let (mut r, _channel) = reconciler();
        r.submit("kept");
        r.apply(ChannelEvent::Partial { text: "done".into() });
        r.apply(complete(1.0, "Lama3.1"));

        r.submit("stalled");
        r.apply(ChannelEvent::Partial { text: "half".into() });
        r.apply(ChannelEvent::StallDetected);
        r.cancel();

        let turns = r.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "kept");
        assert_eq!(turns[1].text, "done");
    }

    #[test]
    fn late_completion_after_a_declared_stall_still_applies() {
        let (mut r, _channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::Partial { text: "slow answer".into() });
        r.apply(ChannelEvent::StallDetected);

        r.apply(complete(55.0, "Lama3.1"));
        assert!(!r.session().timed_out());
        assert!(!r.session().awaiting_response());
        let last = r.transcript().last().unwrap();
        assert!(last.complete);
        assert_eq!(last.elapsed_seconds, Some(55.0));
    }

    #[test]
    fn completion_for_a_cancelled_turn_is_a_noop() {
        let (mut r, _channel) = reconciler();
        r.submit("kept");
        r.apply(ChannelEvent::Partial { text: "ok".into() });
        r.apply(complete(1.0, "Lama3.1"));

        r.submit("doomed");
        r.apply(ChannelEvent::StallDetected);
        r.cancel();

        let snapshot = r.transcript().turns().to_vec();
        r.apply(complete(99.0, "Lama3.1"));
        assert_eq!(r.transcript().len(), snapshot.len());
        assert_eq!(r.transcript().last().unwrap().elapsed_seconds, Some(1.0));
    }

    #[test]
    fn local_timer_declares_the_stall() {
        let (mut r, _channel) = reconciler();
        r.submit("Q");

        assert!(!r.tick(Instant::now()));
        assert!(r.tick(Instant::now() + WINDOW));
        assert!(r.session().timed_out());
    }

    #[test]
    fn channel_errors_become_notices_and_keep_the_transcript() {
        let (mut r, _channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::Partial { text: "partial".into() });

        r.apply(ChannelEvent::ChannelError { message: "backend hiccup".into() });
        assert_eq!(r.take_notice().as_deref(), Some("backend hiccup"));
        assert_eq!(r.take_notice(), None);
        assert_eq!(r.transcript().len(), 2);
    }

    #[test]
    fn disconnect_gates_submission_until_reconnected() {
        let (mut r, _channel) = reconciler();
        r.apply(ChannelEvent::Disconnected { reason: "io error".into() });
        assert!(!r.submit("q"));

        r.apply(ChannelEvent::Connected);
        assert!(r.take_notice().is_some());
        assert!(r.submit("q"));
    }

    #[test]
    fn reconnect_during_a_request_hands_the_decision_to_the_user() {
        let (mut r, _channel) = reconciler();
        r.submit("Q");
        r.apply(ChannelEvent::Disconnected { reason: "io error".into() });
        r.apply(ChannelEvent::Connected);

        assert!(r.session().timed_out());
        assert_eq!(r.transcript().len(), 1);
        assert!(r.resume());
    }
}
