//! Streaming terminal chat client for a document question-answering
//! backend.
//!
//! The reconciliation core (`transcript`, `reconciler`, `gate`, `session`)
//! turns an ordered stream of partial-response events into a consistent,
//! append-only transcript of user/bot turns, with stall detection and
//! explicit resume/cancel recovery. The `channel` module defines the
//! transport seam; `backend` implements it over streaming HTTP; `ui` hosts
//! the terminal surface that drives the core.

pub mod backend;
pub mod channel;
pub mod config;
pub mod events;
pub mod gate;
pub mod reconciler;
pub mod render;
pub mod session;
pub mod transcript;
pub mod ui;

pub use channel::{Channel, ChannelError, LoopbackChannel, Subscription};
pub use config::Config;
pub use events::{ChannelEvent, OutboundRequest};
pub use reconciler::Reconciler;
pub use session::{RequestPhase, SessionState};
pub use transcript::{Sender, Transcript, Turn};
