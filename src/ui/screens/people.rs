use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::identity::IdentityStatus;
use crate::models::format_money;
use crate::session::LedgerSession;
use crate::ui::app::App;
use crate::ui::theme;
use crate::ui::util::truncate;

pub(crate) fn render(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    let people = session.people();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::border_style())
        .title(Span::styled(
            format!(" People ({}) ", people.len()),
            Style::default()
                .fg(theme::TEXT_DIM)
                .add_modifier(Modifier::BOLD),
        ));

    if people.is_empty() {
        let hint = match session.identity_status() {
            IdentityStatus::SignedIn(_) => "Press a to add someone",
            IdentityStatus::Failed(_) => "Not signed in, nothing to show",
            _ => "Connecting...",
        };
        let msg = vec![
            Line::from(""),
            Line::from(Span::styled("No people yet", theme::dim_style())),
            Line::from(""),
            Line::from(Span::styled(hint, theme::dim_style())),
        ];
        f.render_widget(Paragraph::new(msg).centered().block(block), area);
        return;
    }

    let header = Row::new(
        ["Name", "Income", "Due", "Balance"]
            .iter()
            .map(|h| Cell::from(*h).style(theme::header_style())),
    )
    .height(1);

    let open = session.history_person();
    let rows: Vec<Row> = people
        .iter()
        .enumerate()
        .skip(app.person_scroll)
        .take(area.height.saturating_sub(3) as usize)
        .map(|(i, person)| {
            let marker = if open == Some(person.id.as_str()) {
                "\u{25b8} "
            } else {
                "  "
            };
            let balance = person.balance_label();
            let style = if i == app.person_index {
                theme::selected_style()
            } else if i % 2 == 1 {
                theme::alt_row_style()
            } else {
                theme::normal_style()
            };
            Row::new(vec![
                Cell::from(format!("{marker}{}", truncate(&person.name, 28))),
                Cell::from(format_money(person.income)),
                Cell::from(format_money(person.due)),
                Cell::from(Span::styled(balance.to_string(), theme::balance_style(balance))),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Min(16),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Length(22),
    ];
    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}
