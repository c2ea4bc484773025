use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::session::ChatSession;
use crate::transport::HttpTransport;
use crate::ui::conversation::{ConversationAction, ConversationManager};

/// How long to wait for input before checking on the in-flight request
const TICK: Duration = Duration::from_millis(100);

type ChatTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Run the interactive chat until the user exits.
pub fn run(config: &Config) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(config.transport.clone()));
    let session = ChatSession::from_config(config, transport);
    let mut manager = ConversationManager::new(session, &config.ui);

    let session_id = Uuid::new_v4();
    let _span = tracing::info_span!("chat", %session_id).entered();
    tracing::info!(
        base_url = %config.transport.base_url,
        shape = config.transport.shape.as_ref(),
        "starting chat"
    );
    manager.start();

    let mut terminal = setup_terminal()?;
    install_panic_hook();

    let result = event_loop(&mut terminal, &mut manager);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<ChatTerminal> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut ChatTerminal) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Leave the alternate screen before a panic message is printed.
fn install_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        original(info);
    }));
}

fn event_loop(terminal: &mut ChatTerminal, manager: &mut ConversationManager) -> Result<()> {
    let mut dirty = true;

    loop {
        if dirty {
            terminal.draw(|frame| frame.render_widget(&*manager, frame.size()))?;
            dirty = false;
        }

        if event::poll(TICK)? {
            match event::read()? {
                Event::Key(key) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        tracing::info!("chat closed by user");
                        return Ok(());
                    }
                    dirty = true;
                }
                Event::Paste(text) => {
                    manager.handle_paste(&text);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        dirty |= manager.poll();
    }
}
