use crate::session::SessionState;
use crate::transcript::{Sender, Transcript};

/// Submission-eligibility predicate.
///
/// A new user turn may not be submitted when the trimmed input is empty,
/// the session is timed out or disconnected, the last turn is a bot turn
/// still streaming, or the last turn is a user turn whose answer is still
/// pending (suppresses duplicate back-to-back sends).
///
/// Pure function of the current transcript and session state; callers must
/// evaluate it in the same synchronous step as the append so no event can
/// interleave between check and submission.
pub fn can_submit(input: &str, transcript: &Transcript, session: &SessionState) -> bool {
    if input.trim().is_empty() {
        return false;
    }
    if session.timed_out() || !session.connected {
        return false;
    }
    match transcript.last() {
        Some(last) if last.is_streaming_bot() => false,
        Some(last) if last.sender == Sender::User => false,
        _ => true,
    }
}
