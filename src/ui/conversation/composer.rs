use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, SlashCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        block::{Position, Title},
        Block, Borders, Clear, Widget,
    },
};

/// Most text rows the composer grows to before scrolling its content
const MAX_VISIBLE_LINES: usize = 6;

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerAction {
    /// Enter on regular text; the session decides whether it is sent
    Submit,
    Command(SlashCommand),
    None,
}

/// Editing state for the message input.
///
/// The text itself lives in the session's pending input; the composer only
/// tracks the cursor and the command palette.
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    /// Byte offset into the pending input, always on a char boundary
    cursor: usize,
    placeholder: String,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            cursor: 0,
            placeholder: placeholder.into(),
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input against the pending input text
    pub fn handle_key(&mut self, key: KeyEvent, content: &mut String) -> ComposerAction {
        if key.kind != KeyEventKind::Press {
            return ComposerAction::None;
        }
        self.clamp_cursor(content);

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                    self.insert_char(content, '\n');
                } else {
                    if self.show_command_palette {
                        // A bare "/" has not picked anything yet
                        if content.trim_start_matches('/').is_empty() {
                            return ComposerAction::None;
                        }
                        self.apply_selected_command(content);
                        self.close_command_palette();
                    }
                    if content.trim().is_empty() {
                        return ComposerAction::None;
                    }
                    if let Some(command) = parse_slash_command(content) {
                        content.clear();
                        self.cursor = 0;
                        return ComposerAction::Command(command);
                    }
                    return ComposerAction::Submit;
                }
            }
            KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(content, '\n');
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command(content);
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(content, c);
                self.refresh_palette_for(content);
            }
            KeyCode::Backspace => {
                if self.backspace(content) {
                    self.refresh_palette_for(content);
                }
            }
            KeyCode::Delete => {
                if self.delete(content) {
                    self.refresh_palette_for(content);
                }
            }
            KeyCode::Left => {
                if let Some(c) = content[..self.cursor].chars().next_back() {
                    self.cursor -= c.len_utf8();
                }
            }
            KeyCode::Right => {
                if let Some(c) = content[self.cursor..].chars().next() {
                    self.cursor += c.len_utf8();
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = content.len(),
            _ => {}
        }

        ComposerAction::None
    }

    /// Insert pasted text at the cursor
    pub fn handle_paste(&mut self, text: &str, content: &mut String) {
        self.clamp_cursor(content);
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        content.insert_str(self.cursor, &text);
        self.cursor += text.len();
        self.refresh_palette_for(content);
    }

    /// Rows the composer wants, borders included. Grows with the text.
    pub fn desired_height(&self, content: &str) -> u16 {
        let lines = content.split('\n').count().clamp(1, MAX_VISIBLE_LINES);
        lines as u16 + 2
    }

    /// Forget cursor and palette state, e.g. after the input was sent.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.close_command_palette();
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    pub fn view<'a>(&'a self, content: &'a str, can_send: bool, awaiting: bool) -> ComposerView<'a> {
        ComposerView {
            composer: self,
            content,
            can_send,
            awaiting,
        }
    }

    fn clamp_cursor(&mut self, content: &str) {
        if self.cursor > content.len() {
            self.cursor = content.len();
        }
        while !content.is_char_boundary(self.cursor) {
            self.cursor -= 1;
        }
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, content: &mut String, c: char) {
        content.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(&mut self, content: &mut String) -> bool {
        match content[..self.cursor].chars().next_back() {
            Some(c) => {
                self.cursor -= c.len_utf8();
                content.remove(self.cursor);
                true
            }
            None => false,
        }
    }

    /// Delete character at cursor
    fn delete(&mut self, content: &mut String) -> bool {
        if self.cursor < content.len() {
            content.remove(self.cursor);
            true
        } else {
            false
        }
    }

    /// Open, refresh or close the palette to match the current text.
    fn refresh_palette_for(&mut self, content: &str) {
        let is_command_prefix = content.starts_with('/') && !content.contains(char::is_whitespace);
        if is_command_prefix {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette(content);
        } else if self.show_command_palette {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self, content: &str) {
        let query = content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        if self.filtered_commands.is_empty() {
            self.selected_command = None;
        } else {
            let index = self.selected_command.unwrap_or(0);
            self.selected_command = Some(index.min(self.filtered_commands.len() - 1));
        }
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let current = self.selected_command.unwrap_or(0) as isize;
        let len = self.filtered_commands.len() as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command = Some(next as usize);
    }

    fn apply_selected_command(&mut self, content: &mut String) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        *content = format!("/{}", entry.keyword);
        self.cursor = content.len();
        self.close_command_palette();
        true
    }
}

/// Borrowed render view of the composer and the text it edits
pub struct ComposerView<'a> {
    composer: &'a ConversationComposer,
    content: &'a str,
    can_send: bool,
    awaiting: bool,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let composer = self.composer;

        let hint = if self.awaiting {
            " waiting for reply… "
        } else if self.can_send {
            " Enter to send "
        } else {
            ""
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("🧮 Ask a math problem")
            .title(
                Title::from(hint)
                    .position(Position::Bottom)
                    .alignment(Alignment::Right),
            )
            .style(if self.can_send {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                composer.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let cursor = composer.cursor.min(self.content.len());
            let mut content = self.content.to_string();
            if content.is_char_boundary(cursor) {
                content.insert(cursor, '▌');
            }

            let lines: Vec<&str> = content.split('\n').collect();
            let height = inner_area.height as usize;
            let start = lines.len().saturating_sub(height);
            for (i, line_text) in lines[start..].iter().enumerate() {
                let line = Line::from(vec![Span::styled(*line_text, Style::default().fg(Color::White))]);
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        // Command palette floats above the composer
        if composer.show_command_palette && !composer.filtered_commands.is_empty() {
            let palette_height = (composer.filtered_commands.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height,
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            Clear.render(palette_area, buf);
            block.render(palette_area, buf);

            for (index, entry) in composer.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if composer.selected_command == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut ConversationComposer, content: &mut String, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)), content);
        }
    }

    #[test]
    fn typing_and_editing_multibyte_text() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();

        type_text(&mut composer, &mut content, "√x = 4");
        composer.handle_key(press(KeyCode::Home), &mut content);
        composer.handle_key(press(KeyCode::Delete), &mut content);
        assert_eq!(content, "x = 4");

        composer.handle_key(press(KeyCode::End), &mut content);
        composer.handle_key(press(KeyCode::Backspace), &mut content);
        type_text(&mut composer, &mut content, "²");
        assert_eq!(content, "x = ²");
    }

    #[test]
    fn enter_requests_submit_without_clearing() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::from("2 + 2");
        assert_eq!(composer.handle_key(press(KeyCode::Enter), &mut content), ComposerAction::Submit);
        assert_eq!(content, "2 + 2");
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::from("   ");
        assert_eq!(composer.handle_key(press(KeyCode::Enter), &mut content), ComposerAction::None);
    }

    #[test]
    fn shift_enter_inserts_newline_and_grows() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();
        type_text(&mut composer, &mut content, "line one");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT), &mut content);
        type_text(&mut composer, &mut content, "line two");

        assert_eq!(content, "line one\nline two");
        assert_eq!(composer.desired_height(&content), 4);
        assert_eq!(composer.desired_height(&"x\n".repeat(20)), (MAX_VISIBLE_LINES + 2) as u16);
    }

    #[test]
    fn slash_opens_palette_and_tab_completes() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();

        type_text(&mut composer, &mut content, "/ne");
        assert!(composer.is_palette_open());

        composer.handle_key(press(KeyCode::Tab), &mut content);
        assert_eq!(content, "/new");
        assert!(!composer.is_palette_open());

        let action = composer.handle_key(press(KeyCode::Enter), &mut content);
        assert_eq!(action, ComposerAction::Command(SlashCommand::New));
        assert!(content.is_empty());
    }

    #[test]
    fn enter_runs_palette_selection_or_alias() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();
        type_text(&mut composer, &mut content, "/he");
        let action = composer.handle_key(press(KeyCode::Enter), &mut content);
        assert_eq!(action, ComposerAction::Command(SlashCommand::Help));

        type_text(&mut composer, &mut content, "/quit");
        let action = composer.handle_key(press(KeyCode::Enter), &mut content);
        assert_eq!(action, ComposerAction::Command(SlashCommand::Bye));
        assert!(!composer.is_palette_open());
    }

    #[test]
    fn enter_on_bare_slash_does_nothing() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();
        type_text(&mut composer, &mut content, "/");

        let action = composer.handle_key(press(KeyCode::Enter), &mut content);
        assert_eq!(action, ComposerAction::None);
        assert_eq!(content, "/");
        assert!(composer.is_palette_open());
    }

    #[test]
    fn palette_closes_once_text_is_not_a_command() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();
        type_text(&mut composer, &mut content, "/b");
        assert!(composer.is_palette_open());
        type_text(&mut composer, &mut content, " 2");
        assert!(!composer.is_palette_open());
    }

    #[test]
    fn paste_normalizes_line_endings() {
        let mut composer = ConversationComposer::new("ask");
        let mut content = String::new();
        composer.handle_paste("a\r\nb", &mut content);
        assert_eq!(content, "a\nb");
        type_text(&mut composer, &mut content, "c");
        assert_eq!(content, "a\nbc");
    }
}
