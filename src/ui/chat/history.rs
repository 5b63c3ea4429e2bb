use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::render::{bold_segments, wrap_segments};
use crate::session::SessionState;
use crate::transcript::{Sender, Transcript, Turn};

/// Read-only view over the transcript plus session banners: completion
/// footers, the thinking indicator, the stall decision prompt, connection
/// and notice lines. All state lives in the reconciler; this type only
/// draws it.
pub struct TranscriptView<'a> {
    pub transcript: &'a Transcript,
    pub session: &'a SessionState,
    pub status: Option<&'a str>,
}

impl TranscriptView<'_> {
    fn content_style(sender: Sender) -> Style {
        match sender {
            Sender::User => Style::default().fg(Color::Blue),
            Sender::Bot => Style::default().fg(Color::Green),
        }
    }

    /// Render a single turn into lines: a dim header, the wrapped body,
    /// and for completed bot turns a response-time/model footer.
    fn turn_lines(turn: &Turn, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let icon = match turn.sender {
            Sender::User => "👤",
            Sender::Bot => "🤖",
        };
        let timestamp = turn.timestamp.format("%H:%M:%S").to_string();
        let header = format!("{} {} {}", icon, timestamp, "─".repeat(20));
        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let style = Self::content_style(turn.sender);
        let body_width = width.saturating_sub(2) as usize;
        for raw_line in turn.text.split('\n') {
            let segments = bold_segments(raw_line);
            for wrapped in wrap_segments(&segments, body_width) {
                let mut spans = vec![Span::raw("  ")];
                spans.extend(wrapped.into_iter().map(|(text, bold)| {
                    let style = if bold {
                        style.add_modifier(Modifier::BOLD)
                    } else {
                        style
                    };
                    Span::styled(text, style)
                }));
                lines.push(Line::from(spans));
            }
        }

        if turn.sender == Sender::Bot && turn.complete {
            if let (Some(elapsed), Some(model)) = (turn.elapsed_seconds, turn.model_id.as_deref()) {
                lines.push(Line::from(vec![Span::styled(
                    format!("  ⏳ {elapsed:.2}s · model {model}"),
                    Style::default().fg(Color::DarkGray),
                )]));
            }
        }

        lines
    }

    fn banner_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if !self.session.connected {
            lines.push(Line::from(vec![Span::styled(
                "⚠️ No connection to the server",
                Style::default().fg(Color::Red),
            )]));
        }

        // the answer has not started streaming yet
        let thinking = self.session.awaiting_response()
            && !self.session.timed_out()
            && self
                .transcript
                .last()
                .map_or(false, |t| t.sender == Sender::User);
        if thinking && self.session.connected {
            lines.push(Line::from(vec![Span::styled(
                "🤔 Thinking...",
                Style::default().fg(Color::Yellow),
            )]));
        }

        if self.session.timed_out() {
            lines.push(Line::from(vec![Span::styled(
                "⚠️ Request timeout — resume the request? [y] resume · [n] cancel",
                Style::default().fg(Color::Yellow),
            )]));
        }

        if let Some(status) = self.status {
            lines.push(Line::from(vec![Span::styled(
                status.to_string(),
                Style::default().fg(Color::Yellow),
            )]));
        }

        lines
    }
}

impl Widget for TranscriptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("💬 Conversation");
        let inner_area = block.inner(area);
        block.render(area, buf);

        let mut all_lines: Vec<Line> = Vec::new();

        if self.transcript.is_empty() {
            all_lines.push(Line::from(vec![Span::styled(
                "Ask a question about your uploaded documents.",
                Style::default().fg(Color::Gray),
            )]));
            all_lines.push(Line::from(vec![Span::raw("")]));
            all_lines.push(Line::from(vec![Span::styled(
                "Press Enter to send · Up/Down to pick a suggested question.",
                Style::default().fg(Color::DarkGray),
            )]));
        } else {
            for turn in self.transcript.turns() {
                all_lines.extend(Self::turn_lines(turn, inner_area.width));
                // spacing between turns
                all_lines.push(Line::from(vec![Span::raw("")]));
            }
        }

        all_lines.extend(self.banner_lines());

        // show the tail of the conversation, newest lines pinned bottom
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let start = total.saturating_sub(height);
        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}
