use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};

use crate::channel::{Channel, Subscription};
use crate::config::Config;
use crate::reconciler::Reconciler;
use crate::session::SessionState;
use crate::ui::chat::commands::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::chat::composer::{Composer, ComposerResult};
use crate::ui::chat::history::TranscriptView;

/// Actions requested by the chat manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    None,
    Exit,
}

/// Host-side glue: owns the reconciliation core, the composer and the
/// event subscription, and serializes every mutation through the UI event
/// loop (keys, inbound events and timer ticks all run on one thread).
pub struct ChatManager<C: Channel> {
    reconciler: Reconciler<C>,
    composer: Composer,
    subscription: Subscription,
    config: Config,
    status: Option<String>,
}

impl<C: Channel> ChatManager<C> {
    pub fn new(channel: C, config: Config, file_ref: Option<String>) -> Self {
        let subscription = channel.subscribe();
        let session = SessionState::new(config.default_model.clone(), file_ref);
        let reconciler = Reconciler::new(channel, session, config.stall_window());
        let composer = Composer::new(config.canned_questions.clone());

        Self {
            reconciler,
            composer,
            subscription,
            config,
            status: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<C> {
        &self.reconciler
    }

    /// Drain every queued inbound event into the reconciler.
    pub fn pump_events(&mut self) {
        while let Some(event) = self.subscription.try_next() {
            self.reconciler.apply(event);
        }
        if let Some(notice) = self.reconciler.take_notice() {
            self.status = Some(notice);
        }
    }

    /// Drive local stall detection.
    pub fn tick(&mut self) {
        if self.reconciler.tick(Instant::now()) {
            self.status = None;
        }
    }

    /// Handle one key event.
    pub fn handle_key(&mut self, key: KeyEvent) -> ChatAction {
        if key.kind != KeyEventKind::Press {
            return ChatAction::None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            return ChatAction::Exit;
        }

        // a stalled request owns the keyboard until the user decides
        if self.reconciler.session().timed_out() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.reconciler.resume();
                    self.status = Some("resuming request...".to_string());
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.reconciler.cancel();
                    self.status = Some("request cancelled".to_string());
                }
                _ => {}
            }
            return ChatAction::None;
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => {
                self.status = None;
                // a gated submission is dropped silently
                self.reconciler.submit(&text);
                ChatAction::None
            }
            ComposerResult::Command(command) => self.handle_command(command),
            ComposerResult::None => ChatAction::None,
        }
    }

    /// Release the event subscription (idempotent; also runs on drop).
    pub fn shutdown(&mut self) {
        self.subscription.unsubscribe();
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.composer
            .set_focus(!self.reconciler.session().timed_out());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(3)])
            .split(area);

        TranscriptView {
            transcript: self.reconciler.transcript(),
            session: self.reconciler.session(),
            status: self.status.as_deref(),
        }
        .render(chunks[0], buf);

        (&self.composer).render(chunks[1], buf);
    }

    fn handle_command(&mut self, command: ParsedCommand) -> ChatAction {
        match command.command {
            SlashCommand::Model => {
                match command.argument() {
                    Some(wanted) => match self.config.resolve_model(wanted) {
                        Some(model) => {
                            let model = model.to_string();
                            self.reconciler.session_mut().active_model = model.clone();
                            // persist the selection so it survives restarts
                            if let Err(err) = self.config.set_model(&model) {
                                self.status = Some(format!("model set to {model} ({err})"));
                            } else {
                                self.status = Some(format!("model set to {model}"));
                            }
                        }
                        None => {
                            self.status =
                                Some(format!("unknown model '{wanted}' — {}", self.model_list()));
                        }
                    },
                    None => self.status = Some(self.model_list()),
                }
                ChatAction::None
            }
            SlashCommand::Clear => {
                self.reconciler.reset();
                self.composer.clear();
                self.status = Some("started a new chat".to_string());
                ChatAction::None
            }
            SlashCommand::Help => {
                self.status = Some(get_help_text());
                ChatAction::None
            }
            SlashCommand::Quit => ChatAction::Exit,
        }
    }

    fn model_list(&self) -> String {
        format!(
            "models: {} (current: {})",
            self.config.models.join(", "),
            self.reconciler.session().active_model
        )
    }
}
