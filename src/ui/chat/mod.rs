//! Chat surface components: transcript view, composer and the host glue

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use commands::{get_help_text, ParsedCommand, SlashCommand};
pub use composer::{Composer, ComposerResult};
pub use history::TranscriptView;
pub use manager::{ChatAction, ChatManager};
