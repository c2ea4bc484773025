use crate::config::UiConfig;
use crate::session::{ChatSession, SubmitOutcome};
use crate::ui::conversation::{
    get_help_text, ComposerAction, ConversationComposer, ConversationHistory, SlashCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

const PLACEHOLDER: &str = "Ask a math problem (e.g., 4x + 5 = 25)...";
const PAGE_LINES: usize = 10;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Connects key input and rendering to a chat session
pub struct ConversationManager {
    session: ChatSession,
    history: ConversationHistory,
    composer: ConversationComposer,
    /// Transient text such as the help listing; never part of the conversation
    notice: Option<String>,
}

impl ConversationManager {
    pub fn new(session: ChatSession, ui: &UiConfig) -> Self {
        Self {
            session,
            history: ConversationHistory::new(ui.render_mode),
            composer: ConversationComposer::new(PLACEHOLDER),
            notice: None,
        }
    }

    /// Kick off session start work. Must run inside the tokio runtime.
    pub fn start(&self) {
        // Fire and forget; failures are only logged.
        let _ = self.session.start_remote_reset();
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Pick up a finished request. Returns true when a redraw is needed.
    pub fn poll(&mut self) -> bool {
        let changed = self.session.poll_completion();
        if changed {
            self.history.scroll_to_latest();
        }
        // Keep the thinking indicator animated
        changed || self.session.is_awaiting_response()
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return ConversationAction::Exit;
            }
            KeyCode::Esc if !self.composer.is_palette_open() => {
                if self.notice.take().is_some() {
                    return ConversationAction::None;
                }
                if self.session.pending_input().is_empty() {
                    return ConversationAction::Exit;
                }
                return ConversationAction::None;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(PAGE_LINES);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(PAGE_LINES);
                return ConversationAction::None;
            }
            _ => {}
        }

        let mut content = self.session.pending_input().to_string();
        let action = self.composer.handle_key(key, &mut content);
        self.session.set_pending_input(content);

        match action {
            ComposerAction::Submit => {
                self.submit();
                ConversationAction::None
            }
            ComposerAction::Command(command) => self.handle_slash_command(command),
            ComposerAction::None => ConversationAction::None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        let mut content = self.session.pending_input().to_string();
        self.composer.handle_paste(text, &mut content);
        self.session.set_pending_input(content);
    }

    fn submit(&mut self) {
        match self.session.submit_pending() {
            SubmitOutcome::Accepted => {
                self.composer.clear();
                self.notice = None;
                self.history.scroll_to_latest();
            }
            SubmitOutcome::Rejected(reason) => {
                tracing::debug!(?reason, "submission not sent");
            }
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: SlashCommand) -> ConversationAction {
        match command {
            SlashCommand::New => {
                self.session.reset();
                self.composer.clear();
                self.notice = None;
                self.history.scroll_to_latest();
                ConversationAction::None
            }
            SlashCommand::Help => {
                self.notice = Some(get_help_text());
                self.history.scroll_to_latest();
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    fn status_line(&self) -> Line<'static> {
        let settings = self.session.settings();
        let state = if self.session.is_awaiting_response() {
            Span::styled("● solving", Style::default().fg(Color::Yellow))
        } else {
            Span::styled("● ready", Style::default().fg(Color::Green))
        };
        Line::from(vec![
            state,
            Span::styled(
                format!(
                    "  {} · max_tokens {} · temperature {}  ",
                    settings.base_url, settings.max_tokens, settings.temperature
                ),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled("/help · Ctrl+C quit", Style::default().fg(Color::DarkGray)),
        ])
    }
}

impl Widget for &ConversationManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.session.state();
        let composer_height = self.composer.desired_height(&state.pending_input);

        // History takes most space, composer and status line at the bottom
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(composer_height),
                Constraint::Length(1),
            ])
            .split(area);

        self.history
            .view(
                &state.messages,
                state.is_awaiting_response,
                self.notice.as_deref(),
            )
            .render(chunks[0], buf);

        self.composer
            .view(
                &state.pending_input,
                self.session.can_send(),
                state.is_awaiting_response,
            )
            .render(chunks[1], buf);

        buf.set_line(chunks[2].x, chunks[2].y, &self.status_line(), chunks[2].width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::events::ConversationRole;
    use crate::session::RequestSettings;
    use crate::transport::{SolveResult, SolveTransport};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Answers every problem with its own text, or never answers at all.
    struct EchoTransport {
        hang: bool,
    }

    #[async_trait]
    impl SolveTransport for EchoTransport {
        async fn solve(
            &self,
            problem: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<SolveResult, TransportError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(SolveResult::RawResponse(format!("echo: {}", problem)))
        }

        async fn reset_remote_state(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn manager(hang: bool) -> ConversationManager {
        let settings = RequestSettings {
            max_tokens: 512,
            temperature: 0.7,
            base_url: "http://localhost:8000".into(),
            reset_on_start: false,
        };
        let session = ChatSession::new(Arc::new(EchoTransport { hang }), settings, "Hello!", "New chat");
        ConversationManager::new(session, &UiConfig::default())
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(manager: &mut ConversationManager, text: &str) {
        for c in text.chars() {
            assert_eq!(manager.handle_key(press(KeyCode::Char(c))), ConversationAction::None);
        }
    }

    #[tokio::test]
    async fn enter_sends_draft_and_reply_arrives() {
        let mut manager = manager(false);
        type_text(&mut manager, "1 + 1");
        manager.handle_key(press(KeyCode::Enter));

        assert!(manager.session().pending_input().is_empty());
        assert_eq!(manager.session().messages().len(), 2);
        assert_eq!(manager.session().messages()[1].role, ConversationRole::User);

        for _ in 0..100 {
            if !manager.session().is_awaiting_response() {
                break;
            }
            manager.poll();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(manager.session().messages()[2].content, "echo: 1 + 1");
    }

    #[tokio::test]
    async fn draft_is_kept_while_awaiting() {
        let mut manager = manager(true);
        type_text(&mut manager, "first");
        manager.handle_key(press(KeyCode::Enter));
        type_text(&mut manager, "second");
        manager.handle_key(press(KeyCode::Enter));

        assert_eq!(manager.session().pending_input(), "second");
        assert_eq!(manager.session().messages().len(), 2);
    }

    #[tokio::test]
    async fn new_command_resets_while_awaiting() {
        let mut manager = manager(true);
        type_text(&mut manager, "stuck");
        manager.handle_key(press(KeyCode::Enter));
        type_text(&mut manager, "/new");
        manager.handle_key(press(KeyCode::Enter));

        assert_eq!(manager.session().messages().len(), 1);
        assert_eq!(manager.session().messages()[0].content, "New chat");
        assert!(!manager.session().is_awaiting_response());
    }

    #[tokio::test]
    async fn help_notice_then_escape_exits() {
        let mut manager = manager(false);
        type_text(&mut manager, "/help");
        manager.handle_key(press(KeyCode::Enter));
        assert!(manager.notice.as_deref().is_some_and(|n| n.contains("/bye")));
        assert_eq!(manager.session().messages().len(), 1);

        assert_eq!(manager.handle_key(press(KeyCode::Esc)), ConversationAction::None);
        assert!(manager.notice.is_none());
        assert_eq!(manager.handle_key(press(KeyCode::Esc)), ConversationAction::Exit);
    }

    #[tokio::test]
    async fn bare_slash_enter_keeps_conversation() {
        let mut manager = manager(false);
        type_text(&mut manager, "1 + 1");
        manager.handle_key(press(KeyCode::Enter));
        for _ in 0..100 {
            if !manager.session().is_awaiting_response() {
                break;
            }
            manager.poll();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(manager.session().messages().len(), 3);

        type_text(&mut manager, "/");
        assert_eq!(manager.handle_key(press(KeyCode::Enter)), ConversationAction::None);
        assert_eq!(manager.session().messages().len(), 3);
        assert_eq!(manager.session().pending_input(), "/");
    }

    #[tokio::test]
    async fn bye_command_exits() {
        let mut manager = manager(false);
        type_text(&mut manager, "/quit");
        assert_eq!(manager.handle_key(press(KeyCode::Enter)), ConversationAction::Exit);
    }

    #[tokio::test]
    async fn ctrl_c_exits_with_a_draft() {
        let mut manager = manager(false);
        type_text(&mut manager, "unfinished");
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(manager.handle_key(ctrl_c), ConversationAction::Exit);
    }

    #[tokio::test]
    async fn renders_greeting_and_placeholder() {
        let manager = manager(false);
        let area = Rect::new(0, 0, 80, 20);
        let mut buf = Buffer::empty(area);
        (&manager).render(area, &mut buf);

        let text: String = (0..area.height)
            .map(|y| (0..area.width).map(|x| buf.get(x, y).symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("Hello!"));
        assert!(text.contains("Ask a math problem (e.g., 4x + 5 = 25)..."));
    }
}
