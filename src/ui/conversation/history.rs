//! Conversation history display component

use crate::config::RenderMode;
use crate::events::{ConversationMessage, ConversationRole};
use crate::ui::conversation::markdown::render_content;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget,
    },
};

/// Scroll position and rendering options for the history pane.
///
/// The messages themselves belong to the session; this only remembers how
/// far the user has scrolled back.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    render_mode: RenderMode,
    /// Lines scrolled up from the bottom; 0 follows the latest message
    scroll_offset: usize,
}

impl ConversationHistory {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            render_mode,
            scroll_offset: 0,
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_latest(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn is_following(&self) -> bool {
        self.scroll_offset == 0
    }

    pub fn view<'a>(
        &'a self,
        messages: &'a [ConversationMessage],
        awaiting: bool,
        notice: Option<&'a str>,
    ) -> HistoryView<'a> {
        HistoryView {
            history: self,
            messages,
            awaiting,
            notice,
        }
    }

    fn build_lines(
        &self,
        messages: &[ConversationMessage],
        awaiting: bool,
        notice: Option<&str>,
        width: u16,
    ) -> Vec<Line<'static>> {
        let mut all_lines: Vec<Line<'static>> = Vec::new();
        for message in messages {
            all_lines.extend(self.render_message(message, width));
            all_lines.push(Line::default());
        }

        if awaiting {
            all_lines.push(thinking_line());
            all_lines.push(Line::default());
        }

        if let Some(notice) = notice {
            all_lines.extend(render_notice(notice));
        }

        all_lines
    }

    /// Render a single message into lines
    fn render_message(&self, message: &ConversationMessage, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let role_icon = match message.role {
            ConversationRole::User => "👤",
            ConversationRole::Assistant => "🤖",
        };

        let timestamp = message
            .created_at
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S");
        let header = format!(
            "{} {} · {} {}",
            role_icon,
            message.role.display_name(),
            timestamp,
            "─".repeat(20)
        );
        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let content_width = width.saturating_sub(2) as usize;
        for mut line in render_content(
            &message.content,
            self.render_mode,
            content_width,
            content_style(message.role),
        ) {
            line.spans.insert(0, Span::raw("  "));
            lines.push(line);
        }

        lines
    }
}

/// Get content style based on role
fn content_style(role: ConversationRole) -> Style {
    match role {
        ConversationRole::User => Style::default().fg(Color::Blue),
        ConversationRole::Assistant => Style::default().fg(Color::Green),
    }
}

fn thinking_line() -> Line<'static> {
    let dots = (chrono::Utc::now().timestamp_millis() / 400).rem_euclid(4) as usize;
    Line::from(vec![
        Span::styled("🤖 ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("thinking{}", ".".repeat(dots)),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ),
    ])
}

fn render_notice(notice: &str) -> Vec<Line<'static>> {
    let style = Style::default().fg(Color::Yellow);
    let mut lines = vec![Line::from(Span::styled(
        format!("ℹ️  {}", "─".repeat(20)),
        Style::default().fg(Color::DarkGray),
    ))];
    lines.extend(
        notice
            .lines()
            .map(|text| Line::from(vec![Span::raw("  "), Span::styled(text.to_string(), style)])),
    );
    lines
}

/// Borrowed render view over the session's messages
pub struct HistoryView<'a> {
    history: &'a ConversationHistory,
    messages: &'a [ConversationMessage],
    awaiting: bool,
    notice: Option<&'a str>,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.history.is_following() {
            "💬 Conversation".to_string()
        } else {
            "💬 Conversation (scrolled, PageDown to return)".to_string()
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        block.render(area, buf);

        // Leave the rightmost column for the scrollbar
        let text_width = inner_area.width.saturating_sub(1);
        let all_lines =
            self.history
                .build_lines(self.messages, self.awaiting, self.notice, text_width);

        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        let offset = self.history.scroll_offset.min(max_offset);
        let end = total - offset;
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, text_width);
        }

        if total > height {
            let mut state = ScrollbarState::new(max_offset).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner_area, buf, &mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_rows(view: HistoryView<'_>, width: u16, height: u16) -> Vec<String> {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        (0..height)
            .map(|y| (0..width).map(|x| buf.get(x, y).symbol()).collect::<String>())
            .collect()
    }

    fn conversation(turns: usize) -> Vec<ConversationMessage> {
        let mut messages = vec![ConversationMessage::assistant("Hello!")];
        for i in 0..turns {
            messages.push(ConversationMessage::user(format!("question {}", i)));
            messages.push(ConversationMessage::assistant(format!("answer {}", i)));
        }
        messages
    }

    #[test]
    fn shows_latest_messages_by_default() {
        let history = ConversationHistory::new(RenderMode::Plain);
        let messages = conversation(10);
        let rows = render_rows(history.view(&messages, false, None), 60, 12);
        let text = rows.join("\n");

        assert!(text.contains("answer 9"));
        assert!(!text.contains("Hello!"));
    }

    #[test]
    fn thinking_indicator_while_awaiting() {
        let history = ConversationHistory::new(RenderMode::Plain);
        let messages = vec![
            ConversationMessage::assistant("Hello!"),
            ConversationMessage::user("2x = 4"),
        ];

        let idle = render_rows(history.view(&messages, false, None), 60, 12).join("\n");
        assert!(!idle.contains("thinking"));

        let busy = render_rows(history.view(&messages, true, None), 60, 12).join("\n");
        assert!(busy.contains("2x = 4"));
        assert!(busy.contains("thinking"));
    }

    #[test]
    fn scrolling_back_hides_latest_until_returning() {
        let mut history = ConversationHistory::new(RenderMode::Plain);
        let messages = conversation(10);

        history.scroll_up(20);
        assert!(!history.is_following());
        let text = render_rows(history.view(&messages, false, None), 60, 12).join("\n");
        assert!(!text.contains("answer 9"));

        history.scroll_to_latest();
        let text = render_rows(history.view(&messages, false, None), 60, 12).join("\n");
        assert!(text.contains("answer 9"));
    }

    #[test]
    fn scroll_offset_is_clamped_to_content() {
        let mut history = ConversationHistory::new(RenderMode::Plain);
        let messages = conversation(10);

        history.scroll_up(10_000);
        let text = render_rows(history.view(&messages, false, None), 60, 12).join("\n");
        assert!(text.contains("Hello!"));
    }

    #[test]
    fn notice_is_shown_below_messages() {
        let history = ConversationHistory::new(RenderMode::Plain);
        let messages = conversation(1);
        let text = render_rows(history.view(&messages, false, Some("Available commands:")), 60, 14)
            .join("\n");
        assert!(text.contains("Available commands:"));
    }

    #[test]
    fn greeting_stays_reachable_in_long_conversations() {
        let mut history = ConversationHistory::new(RenderMode::Plain);
        let messages = conversation(200);

        history.scroll_up(100_000);
        let rows = render_rows(history.view(&messages, false, None), 60, 12);
        assert!(rows[2].contains("Hello!"));
        assert!(rows.join("\n").contains("question 0"));
    }
}
