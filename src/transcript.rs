use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// One message in the transcript.
///
/// Bot turns grow incrementally while streaming; `complete` flips once no
/// further fragments will arrive and the completion metadata is stamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
    pub complete: bool,
    pub elapsed_seconds: Option<f64>,
    pub model_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// A user turn is complete at creation.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            complete: true,
            elapsed_seconds: None,
            model_id: None,
            timestamp: Utc::now(),
        }
    }

    /// A bot turn starts incomplete with its first streamed fragment.
    pub fn bot(first_fragment: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: first_fragment.into(),
            complete: false,
            elapsed_seconds: None,
            model_id: None,
            timestamp: Utc::now(),
        }
    }

    /// A bot turn that is still receiving fragments.
    pub fn is_streaming_bot(&self) -> bool {
        self.sender == Sender::Bot && !self.complete
    }
}

/// Ordered, append-only log of turns — the single source of truth.
///
/// All writes go through `append`, `update_last`, `truncate_last` and
/// `reset`; there is no indexed mutation, which keeps the "append-only
/// except for the trailing in-progress turn" invariant enforceable here.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Apply `mutator` to the final turn if `predicate` holds for it.
    /// Returns whether the mutation was applied; a failed predicate or an
    /// empty transcript is a no-op.
    pub fn update_last<P, M>(&mut self, predicate: P, mutator: M) -> bool
    where
        P: FnOnce(&Turn) -> bool,
        M: FnOnce(&mut Turn),
    {
        match self.turns.last_mut() {
            Some(last) if predicate(last) => {
                mutator(last);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the final turn, if any.
    pub fn truncate_last(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    /// Drop every turn (new chat session).
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text of the most recent user turn, if one exists. Used to rebuild
    /// the continuation payload after a stall.
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.sender == Sender::User)
            .map(|t| t.text.as_str())
    }
}
