use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::models::EntryKind;
use crate::session::{LedgerSession, SessionEvent};
use crate::sync::HistoryChange;
use crate::ui::app::{App, InputMode};
use crate::ui::util::{scroll_down, scroll_to_bottom, scroll_to_top, scroll_up};

enum Incoming {
    Session(SessionEvent),
    Terminal(Option<io::Result<Event>>),
}

pub(crate) async fn as_tui(mut session: LedgerSession) -> Result<()> {
    let mut app = App::new();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &mut session).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    session: &mut LedgerSession,
) -> Result<()> {
    let mut events = EventStream::new();
    info!("terminal session started");

    while app.running {
        terminal.draw(|f| {
            // Title, status and command bars plus table borders and header
            let content_height = f.area().height.saturating_sub(6) as usize;
            app.visible_rows = content_height.max(1);
            crate::ui::render::render(f, app, session);
        })?;

        let incoming = tokio::select! {
            event = session.next_event() => Incoming::Session(event),
            event = events.next() => Incoming::Terminal(event),
        };

        match incoming {
            Incoming::Session(event) => app.on_session_event(&event, session),
            Incoming::Terminal(None) => app.running = false,
            Incoming::Terminal(Some(event)) => {
                if let Event::Key(key) = event? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if app.show_help {
                        app.show_help = false;
                        continue;
                    }
                    match app.input_mode {
                        InputMode::Normal => handle_normal_input(key, app, session),
                        InputMode::AddPerson => handle_name_input(key, app, session),
                        InputMode::Amount(_) => handle_amount_input(key, app, session),
                        InputMode::Confirm => handle_confirm_input(key, app, session),
                    }
                }
            }
        }
    }
    info!("terminal session ended");
    Ok(())
}

// ── Input handlers ───────────────────────────────────────────

fn handle_normal_input(key: KeyEvent, app: &mut App, session: &mut LedgerSession) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let len = session.people().len();
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => app.running = false,
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('d') if ctrl => {
            let half_page = app.visible_rows / 2;
            for _ in 0..half_page {
                scroll_down(
                    &mut app.person_index,
                    &mut app.person_scroll,
                    len,
                    app.visible_rows,
                );
            }
        }
        KeyCode::Char('u') if ctrl => {
            let half_page = app.visible_rows / 2;
            for _ in 0..half_page {
                scroll_up(&mut app.person_index, &mut app.person_scroll);
            }
        }
        KeyCode::Char('j') | KeyCode::Down => scroll_down(
            &mut app.person_index,
            &mut app.person_scroll,
            len,
            app.visible_rows,
        ),
        KeyCode::Char('k') | KeyCode::Up => {
            scroll_up(&mut app.person_index, &mut app.person_scroll);
        }
        KeyCode::Char('g') => scroll_to_top(&mut app.person_index, &mut app.person_scroll),
        KeyCode::Char('G') => scroll_to_bottom(
            &mut app.person_index,
            &mut app.person_scroll,
            len,
            app.visible_rows,
        ),
        KeyCode::Char('J') => {
            if app.history_scroll + 1 < session.history().len() {
                app.history_scroll += 1;
            }
        }
        KeyCode::Char('K') => app.history_scroll = app.history_scroll.saturating_sub(1),
        KeyCode::Char('a') => app.enter(InputMode::AddPerson),
        KeyCode::Char('i') => open_amount(app, session, EntryKind::Income),
        KeyCode::Char('d') => open_amount(app, session, EntryKind::Due),
        KeyCode::Enter | KeyCode::Char('h') => {
            if let Some(person_id) = app.selected_person_id(session) {
                toggle_history(app, session, &person_id);
            }
        }
        KeyCode::Char('x') | KeyCode::Char('D') => {
            let Some(person_id) = app.selected_person_id(session) else {
                return;
            };
            match session.request_delete(&person_id) {
                Ok(()) => app.enter(InputMode::Confirm),
                Err(e) => report(app, &e),
            }
        }
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Esc => {
            if let Some(person_id) = session.history_person().map(str::to_string) {
                toggle_history(app, session, &person_id);
                debug!(person_id, "history closed from keyboard");
            } else {
                app.status_message.clear();
            }
        }
        _ => {}
    }
}

fn handle_name_input(key: KeyEvent, app: &mut App, session: &mut LedgerSession) {
    match key.code {
        KeyCode::Enter => {
            let name = app.input.clone();
            app.leave_input();
            match session.add_person(&name) {
                Ok(()) => app.set_status(format!("Adding {}...", name.trim())),
                // An empty line just closes the prompt.
                Err(LedgerError::EmptyName) => {}
                Err(e) => report(app, &e),
            }
        }
        KeyCode::Esc => app.leave_input(),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        _ => {}
    }
}

fn handle_amount_input(key: KeyEvent, app: &mut App, session: &mut LedgerSession) {
    match key.code {
        KeyCode::Enter => match session.confirm_transaction(&app.input) {
            Ok(()) => {
                app.leave_input();
                app.set_status("Recording...");
            }
            Err(e @ LedgerError::InvalidAmount(_)) => {
                app.input.clear();
                report(app, &e);
            }
            Err(e) => {
                app.leave_input();
                report(app, &e);
            }
        },
        KeyCode::Esc => {
            session.cancel_transaction_modal();
            app.leave_input();
        }
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => app.input.push(c),
        _ => {}
    }
}

fn handle_confirm_input(key: KeyEvent, app: &mut App, session: &mut LedgerSession) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let name = session
                .pending_delete()
                .map(|flow| flow.person_name().to_string())
                .unwrap_or_default();
            match session.confirm_delete() {
                Ok(()) => app.set_status(format!("Deleting {name}...")),
                Err(e) => report(app, &e),
            }
        }
        _ => {
            // Any other key = cancel
            session.cancel_delete();
            app.set_status("Cancelled");
        }
    }
    app.leave_input();
}

// ── Actions ──────────────────────────────────────────────────

fn report(app: &mut App, err: &LedgerError) {
    if err.is_rejection() {
        debug!(error = %err, "intent rejected");
    } else {
        warn!(error = %err, "intent failed");
    }
    app.set_status(format!("Error: {err}"));
}

fn open_amount(app: &mut App, session: &mut LedgerSession, kind: EntryKind) {
    let Some(person_id) = app.selected_person_id(session) else {
        app.set_status("Add a person first");
        return;
    };
    match session.open_transaction_modal(&person_id, kind) {
        Ok(()) => app.enter(InputMode::Amount(kind)),
        Err(e) => report(app, &e),
    }
}

fn toggle_history(app: &mut App, session: &mut LedgerSession, person_id: &str) {
    match session.toggle_history(person_id) {
        Ok(HistoryChange::Closed) => {}
        Ok(HistoryChange::Opened | HistoryChange::Switched) => app.history_scroll = 0,
        Err(e) => report(app, &e),
    }
}
