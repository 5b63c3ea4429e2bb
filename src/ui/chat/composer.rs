use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::ui::chat::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};

/// Result returned when the user interacts with the composer.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Entries offered by the suggestion palette: canned questions while the
/// input is empty, slash commands once the input starts with '/'.
#[derive(Debug, Clone, PartialEq)]
enum PaletteItem {
    Question(String),
    Command(CommandEntry),
}

/// Input composer: a single-line editor with a suggestion palette.
#[derive(Clone)]
pub struct Composer {
    content: String,
    cursor: usize,
    has_focus: bool,
    questions: Vec<String>,
    palette: Vec<PaletteItem>,
    selected: Option<usize>,
}

impl Composer {
    pub fn new(questions: Vec<String>) -> Self {
        let mut composer = Self {
            content: String::new(),
            cursor: 0,
            has_focus: true,
            questions,
            palette: Vec::new(),
            selected: None,
        };
        composer.refresh_palette();
        composer
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
        self.refresh_palette();
    }

    #[allow(dead_code)]
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.refresh_palette();
    }

    /// Handle key input; editing keys mutate the draft, Enter submits.
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if let Some(result) = self.apply_selection() {
                    return result;
                }
                if !self.content.trim().is_empty() {
                    let content = std::mem::take(&mut self.content);
                    self.cursor = 0;
                    self.refresh_palette();
                    if let Some(command) = parse_slash_command(&content) {
                        return ComposerResult::Command(command);
                    }
                    return ComposerResult::Submitted(content);
                }
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Esc => {
                self.palette.clear();
                self.selected = None;
            }
            KeyCode::Tab => {
                // fill the draft without submitting
                if let Some(index) = self.selected {
                    match self.palette.get(index).cloned() {
                        Some(PaletteItem::Question(q)) => {
                            self.content = q;
                            self.cursor = self.content.len();
                            self.palette.clear();
                            self.selected = None;
                        }
                        Some(PaletteItem::Command(entry)) => {
                            self.content = format!("/{} ", entry.keyword);
                            self.cursor = self.content.len();
                            self.refresh_palette();
                        }
                        None => {}
                    }
                }
            }
            KeyCode::Char(c) => {
                self.content.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                self.refresh_palette();
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let prev = floor_char_boundary(&self.content, self.cursor - 1);
                    self.content.remove(prev);
                    self.cursor = prev;
                    self.refresh_palette();
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.content.len() {
                    self.content.remove(self.cursor);
                    self.refresh_palette();
                }
            }
            KeyCode::Left => {
                if self.cursor > 0 {
                    self.cursor = floor_char_boundary(&self.content, self.cursor - 1);
                }
            }
            KeyCode::Right => {
                if self.cursor < self.content.len() {
                    let mut next = self.cursor + 1;
                    while next < self.content.len() && !self.content.is_char_boundary(next) {
                        next += 1;
                    }
                    self.cursor = next;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.content.len(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Apply the highlighted palette entry on Enter. Picking a canned
    /// question submits it directly; picking a command fills the draft.
    fn apply_selection(&mut self) -> Option<ComposerResult> {
        let index = self.selected?;
        match self.palette.get(index).cloned()? {
            PaletteItem::Question(question) => {
                self.clear();
                Some(ComposerResult::Submitted(question))
            }
            PaletteItem::Command(entry) => {
                self.content = format!("/{} ", entry.keyword);
                self.cursor = self.content.len();
                self.refresh_palette();
                Some(ComposerResult::None)
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.palette.is_empty() {
            self.selected = None;
            return;
        }
        let len = self.palette.len() as isize;
        // first Down lands on the first entry, first Up on the last
        let current = match self.selected {
            Some(s) => s as isize,
            None => {
                if delta > 0 {
                    -1
                } else {
                    0
                }
            }
        };
        let mut next = current + delta;
        if next < 0 {
            next = len - 1;
        } else if next >= len {
            next = 0;
        }
        self.selected = Some(next as usize);
    }

    /// Recompute palette entries from the draft: canned questions while
    /// empty, filtered commands after a leading '/'.
    fn refresh_palette(&mut self) {
        self.palette.clear();

        if self.content.is_empty() {
            if self.has_focus {
                self.palette
                    .extend(self.questions.iter().cloned().map(PaletteItem::Question));
            }
        } else if self.content.starts_with('/') && !self.content.contains(char::is_whitespace) {
            let query = self.content.trim_start_matches('/').to_lowercase();
            self.palette.extend(
                command_entries()
                    .iter()
                    .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
                    .copied()
                    .map(PaletteItem::Command),
            );
        }

        match (self.palette.is_empty(), self.selected) {
            (true, _) => self.selected = None,
            (false, Some(index)) => self.selected = Some(index.min(self.palette.len() - 1)),
            // nothing is preselected; Up/Down picks an entry
            (false, None) => {}
        }
    }

    fn palette_height(&self) -> u16 {
        if self.palette.is_empty() {
            0
        } else {
            (self.palette.len().min(5) + 2) as u16
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Ask about your documents")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder = Line::from(vec![Span::styled(
                "Type a question, pick a suggestion, or / for commands...",
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder, inner_area.width);
        } else {
            let mut content = self.content.clone();
            if self.has_focus {
                content.insert(self.cursor.min(content.len()), '▌');
            }
            let line = Line::from(vec![Span::raw(content)]);
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
        }

        // suggestion palette floats above the input
        if !self.palette.is_empty() {
            let palette_height = self.palette_height();
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height,
            };

            let title = if self.content.starts_with('/') {
                "Commands"
            } else {
                "Suggested questions"
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .title(title)
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, item) in self.palette.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let is_selected = self.selected == Some(index);
                let style = if is_selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = match item {
                    PaletteItem::Question(question) => {
                        Line::from(vec![Span::styled(question.clone(), style)])
                    }
                    PaletteItem::Command(entry) => Line::from(vec![
                        Span::styled(format!("/{}", entry.keyword), style),
                        Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                        Span::styled(entry.description, Style::default().fg(Color::Gray)),
                    ]),
                };

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::chat::commands::SlashCommand;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn composer() -> Composer {
        Composer::new(vec![
            "Welches Thema hat diese Bachelorarbeit?".to_string(),
            "Wer ist der HS-Betreuer dieser Bachelorarbeit?".to_string(),
        ])
    }

    #[test]
    fn typed_text_submits_on_enter() {
        let mut c = composer();
        for ch in "hi there".chars() {
            c.handle_key(key(KeyCode::Char(ch)));
        }
        assert_eq!(
            c.handle_key(key(KeyCode::Enter)),
            ComposerResult::Submitted("hi there".to_string())
        );
        assert!(c.content().is_empty());
    }

    #[test]
    fn picking_a_suggested_question_submits_it() {
        let mut c = composer();
        c.handle_key(key(KeyCode::Down));
        let result = c.handle_key(key(KeyCode::Enter));
        assert_eq!(
            result,
            ComposerResult::Submitted("Welches Thema hat diese Bachelorarbeit?".to_string())
        );
    }

    #[test]
    fn slash_input_parses_as_a_command() {
        let mut c = composer();
        for ch in "/clear".chars() {
            c.handle_key(key(KeyCode::Char(ch)));
        }
        c.handle_key(key(KeyCode::Esc));
        match c.handle_key(key(KeyCode::Enter)) {
            ComposerResult::Command(parsed) => assert_eq!(parsed.command, SlashCommand::Clear),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn tab_fills_the_draft_without_submitting() {
        let mut c = composer();
        c.handle_key(key(KeyCode::Down));
        assert_eq!(c.handle_key(key(KeyCode::Tab)), ComposerResult::None);
        assert_eq!(c.content(), "Welches Thema hat diese Bachelorarbeit?");
    }

    #[test]
    fn empty_enter_submits_nothing() {
        let mut c = Composer::new(Vec::new());
        assert_eq!(c.handle_key(key(KeyCode::Enter)), ComposerResult::None);
    }
}
