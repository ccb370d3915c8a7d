use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::app::{App, InputMode};
use super::screens;
use super::theme;
use super::util::{centered_rect, truncate};
use crate::identity::IdentityStatus;
use crate::session::LedgerSession;

pub(crate) fn render(f: &mut Frame, app: &App, session: &LedgerSession) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(5),    // People and history
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Command bar
        ])
        .split(f.area());

    render_title_bar(f, chunks[0], session);
    render_main(f, chunks[1], app, session);
    render_status_bar(f, chunks[2], app, session);
    render_command_bar(f, chunks[3], app, session);

    if let InputMode::Amount(_) = app.input_mode {
        render_amount_modal(f, f.area(), app, session);
    }
    if app.show_help {
        render_help_overlay(f, f.area());
    }
}

fn render_title_bar(f: &mut Frame, area: Rect, session: &LedgerSession) {
    let identity = match session.identity_status() {
        IdentityStatus::Unknown => Span::styled("connecting", theme::dim_style()),
        IdentityStatus::SigningIn => Span::styled("signing in...", theme::pending_style()),
        IdentityStatus::SignedIn(id) => Span::styled(
            format!("user {}", truncate(id.as_str(), 12)),
            theme::dim_style(),
        ),
        IdentityStatus::Failed(_) => {
            Span::styled("offline", Style::default().fg(theme::RED))
        }
    };
    let mut spans = vec![
        Span::styled(" Tally ", theme::title_style()),
        Span::styled("| ", Style::default().fg(theme::OVERLAY)),
        identity,
    ];
    if let Some(scope) = session.scope() {
        spans.push(Span::styled(" | ", Style::default().fg(theme::OVERLAY)));
        spans.push(Span::styled(
            scope.people().as_str().to_string(),
            theme::dim_style(),
        ));
    }
    let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme::HEADER_BG));
    f.render_widget(bar, area);
}

fn render_main(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    if session.history_person().is_none() {
        screens::people::render(f, area, app, session);
        return;
    }
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    screens::people::render(f, panes[0], app, session);
    screens::history::render(f, panes[1], app, session);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    let mode_label = format!(" {} ", app.input_mode);
    let mode_style = match app.input_mode {
        InputMode::Normal => theme::mode_style(theme::ACCENT),
        InputMode::AddPerson => theme::mode_style(theme::GREEN),
        InputMode::Amount(_) => theme::mode_style(theme::YELLOW),
        InputMode::Confirm => theme::mode_style(theme::RED),
    };

    let info = format!(" {} people", session.people().len());
    let right = match app.input_mode {
        InputMode::Normal => " a add | i/d record | Enter history | x delete | ? help ",
        InputMode::AddPerson | InputMode::Amount(_) => " Enter confirm | Esc cancel ",
        InputMode::Confirm => " y delete | any other key cancels ",
    };

    let used = mode_label.len() + info.len() + right.len();
    let pad = (area.width as usize).saturating_sub(used);
    let bar = Paragraph::new(Line::from(vec![
        Span::styled(&mode_label, mode_style),
        Span::styled(&info, theme::status_bar_style()),
        Span::styled(" ".repeat(pad), theme::status_bar_style()),
        Span::styled(right, theme::status_bar_style()),
    ]));
    f.render_widget(bar, area);
}

fn render_command_bar(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    let (content, cursor_offset) = match app.input_mode {
        InputMode::AddPerson => (
            Line::from(vec![
                Span::styled("name> ", Style::default().fg(theme::GREEN)),
                Span::styled(&app.input, theme::command_bar_style()),
            ]),
            Some(6 + app.input.chars().count() as u16),
        ),
        InputMode::Confirm => {
            let name = session
                .pending_delete()
                .map_or("this person", |flow| flow.person_name());
            (
                Line::from(vec![
                    Span::styled(
                        format!("Delete {name} and all of their transactions?"),
                        Style::default().fg(theme::YELLOW),
                    ),
                    Span::styled(" [y/N] ", Style::default().fg(theme::RED)),
                ]),
                None,
            )
        }
        InputMode::Normal | InputMode::Amount(_) => (
            if app.status_message.is_empty() {
                Line::from(Span::styled(" Press ? for help", theme::dim_style()))
            } else {
                Line::from(Span::styled(&app.status_message, theme::command_bar_style()))
            },
            None,
        ),
    };

    let bar = Paragraph::new(content).style(Style::default().bg(theme::COMMAND_BG));
    f.render_widget(bar, area);

    if let Some(offset) = cursor_offset {
        f.set_cursor_position((area.x + offset, area.y));
    }
}

fn render_amount_modal(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    let Some(draft) = session.draft() else {
        return;
    };
    let title = format!(" {} for {} ", draft.kind, truncate(&draft.person_name, 24));
    let popup = centered_rect(44, 5, area);
    let body = vec![
        Line::from(vec![
            Span::styled(" Amount: $", theme::entry_style(draft.kind)),
            Span::styled(&app.input, theme::normal_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(" Enter to record, Esc to cancel", theme::dim_style())),
    ];

    f.render_widget(Clear, popup);
    let modal = Paragraph::new(body).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(title, theme::section_style()))
            .border_style(Style::default().fg(theme::ACCENT))
            .style(Style::default().bg(theme::HEADER_BG)),
    );
    f.render_widget(modal, popup);
    f.set_cursor_position((popup.x + 11 + app.input.chars().count() as u16, popup.y + 1));
}

fn render_help_overlay(f: &mut Frame, area: Rect) {
    let key = |keys: &str, what: &str| {
        Line::from(Span::styled(format!("  {keys:<18} {what}"), theme::normal_style()))
    };
    let help_text = vec![
        Line::from(Span::styled(" Tally Help ", theme::title_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", theme::section_style())),
        key("j/k or Up/Down", "Move cursor"),
        key("g/G", "Top/Bottom"),
        key("J/K", "Scroll history"),
        key("q / Ctrl-c", "Quit"),
        Line::from(""),
        Line::from(Span::styled(" Ledger", theme::section_style())),
        key("a", "Add a person"),
        key("i", "Record income for the selected person"),
        key("d", "Record a due for the selected person"),
        key("Enter / h", "Show or hide their history"),
        key("x / D", "Delete the selected person"),
        key("Esc", "Close history / clear status"),
        Line::from(""),
        Line::from(Span::styled(" Press any key to close ", theme::dim_style())),
    ];

    let popup = centered_rect(60, help_text.len() as u16 + 2, area);
    f.render_widget(Clear, popup);
    let help = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::ACCENT))
            .style(Style::default().bg(theme::HEADER_BG)),
    );
    f.render_widget(help, popup);
}
