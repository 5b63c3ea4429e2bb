use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

/// Markdown-lite display transform: newlines become line breaks and
/// `**bold**` spans become bold styling. Pure and stateless — applied at
/// display time, never stored back into the transcript. The text itself
/// is passed through verbatim (no markup language is emitted), so content
/// containing angle brackets or other markup cannot be misinterpreted.
pub fn styled_lines(text: &str, base: Style) -> Vec<Line<'static>> {
    text.split('\n')
        .map(|raw| {
            let spans: Vec<Span<'static>> = bold_segments(raw)
                .into_iter()
                .map(|(segment, bold)| {
                    let style = if bold {
                        base.add_modifier(Modifier::BOLD)
                    } else {
                        base
                    };
                    Span::styled(segment, style)
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

/// Split one line into `(text, is_bold)` segments. `**` markers must pair
/// up; an unmatched marker is kept as literal text.
pub fn bold_segments(raw: &str) -> Vec<(String, bool)> {
    let mut segments = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**") else {
            break;
        };
        if open > 0 {
            segments.push((rest[..open].to_string(), false));
        }
        if close > 0 {
            segments.push((after[..close].to_string(), true));
        }
        rest = &after[close + 2..];
    }

    if !rest.is_empty() {
        segments.push((rest.to_string(), false));
    }
    segments
}

/// The display text with markers resolved, markup-free.
pub fn plain_text(raw: &str) -> String {
    bold_segments(raw)
        .into_iter()
        .map(|(segment, _)| segment)
        .collect()
}

/// Greedy word wrap over styled segments. Whitespace is collapsed to
/// single spaces; a bold run that crosses the wrap point keeps its style
/// on both lines.
pub fn wrap_segments(segments: &[(String, bool)], width: usize) -> Vec<Vec<(String, bool)>> {
    if width == 0 {
        return vec![segments.to_vec()];
    }

    let mut lines: Vec<Vec<(String, bool)>> = Vec::new();
    let mut current: Vec<(String, bool)> = Vec::new();
    let mut current_len = 0usize;

    for (text, bold) in segments {
        for word in text.split_whitespace() {
            let word_len = word.chars().count();
            let needed = if current_len == 0 { word_len } else { word_len + 1 };

            if current_len > 0 && current_len + needed > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }

            let mut piece = String::new();
            if current_len > 0 {
                piece.push(' ');
            }
            piece.push_str(word);
            current_len += if current_len == 0 { word_len } else { word_len + 1 };

            // merge into the previous run when the style matches
            match current.last_mut() {
                Some((last, last_bold)) if *last_bold == *bold => last.push_str(&piece),
                _ => current.push((piece, *bold)),
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(Vec::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            bold_segments("Die Arbeit behandelt..."),
            vec![("Die Arbeit behandelt...".to_string(), false)]
        );
    }

    #[test]
    fn bold_markers_are_resolved() {
        assert_eq!(
            bold_segments("the **key point** here"),
            vec![
                ("the ".to_string(), false),
                ("key point".to_string(), true),
                (" here".to_string(), false),
            ]
        );
    }

    #[test]
    fn unmatched_marker_stays_literal() {
        assert_eq!(
            bold_segments("a ** b"),
            vec![("a ** b".to_string(), false)]
        );
        assert_eq!(
            bold_segments("**a** trailing **"),
            vec![("a".to_string(), true), (" trailing **".to_string(), false)]
        );
    }

    #[test]
    fn angle_brackets_are_not_interpreted() {
        assert_eq!(
            bold_segments("literal <br> and <strong>tags</strong>"),
            vec![("literal <br> and <strong>tags</strong>".to_string(), false)]
        );
    }

    #[test]
    fn transform_is_idempotent_on_its_own_output() {
        let once = plain_text("**a** and **b**");
        let twice = plain_text(&once);
        assert_eq!(once, "a and b");
        assert_eq!(once, twice);
    }

    #[test]
    fn newlines_become_separate_lines() {
        let lines = styled_lines("first\nsecond", Style::default());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn wrap_respects_the_width_limit() {
        let segments = vec![("one two three four".to_string(), false)];
        let wrapped = wrap_segments(&segments, 10);
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0], vec![("one two".to_string(), false)]);
        assert_eq!(wrapped[1], vec![("three four".to_string(), false)]);
    }

    #[test]
    fn wrap_keeps_bold_runs_across_the_break() {
        let segments = vec![
            ("plain ".to_string(), false),
            ("bold words here".to_string(), true),
        ];
        let wrapped = wrap_segments(&segments, 11);
        assert!(wrapped.len() >= 2);
        // the continuation line still carries the bold flag
        assert!(wrapped[1].iter().all(|(_, bold)| *bold));
    }

    #[test]
    fn wrap_of_empty_input_yields_one_empty_line() {
        let wrapped = wrap_segments(&[], 10);
        assert_eq!(wrapped, vec![Vec::new()]);
    }
}
