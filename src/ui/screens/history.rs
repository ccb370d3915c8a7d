use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::session::LedgerSession;
use crate::ui::app::App;
use crate::ui::theme;

pub(crate) fn render(f: &mut Frame, area: Rect, app: &App, session: &LedgerSession) {
    let name = session
        .history_person()
        .and_then(|id| session.person(id))
        .map_or("", |p| p.name.as_str());
    let entries = session.history();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::ACCENT))
        .title(Span::styled(
            format!(" History: {name} ({}) ", entries.len()),
            Style::default()
                .fg(theme::TEXT_DIM)
                .add_modifier(Modifier::BOLD),
        ));

    if entries.is_empty() {
        let msg = vec![
            Line::from(""),
            Line::from(Span::styled("No transactions yet", theme::dim_style())),
            Line::from(""),
            Line::from(Span::styled(
                "i records income, d records a due",
                theme::dim_style(),
            )),
        ];
        f.render_widget(Paragraph::new(msg).centered().block(block), area);
        return;
    }

    let header = Row::new(
        ["When", "Type", "Amount"]
            .iter()
            .map(|h| Cell::from(*h).style(theme::header_style())),
    )
    .height(1);

    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .skip(app.history_scroll)
        .take(area.height.saturating_sub(3) as usize)
        .map(|(i, txn)| {
            let when = if txn.is_pending() {
                Span::styled(txn.when_label(), theme::pending_style())
            } else {
                Span::raw(txn.when_label())
            };
            let row_style = if i % 2 == 1 {
                theme::alt_row_style()
            } else {
                theme::normal_style()
            };
            Row::new(vec![
                Cell::from(when),
                Cell::from(txn.kind.to_string()),
                Cell::from(Span::styled(txn.amount_label(), theme::entry_style(txn.kind))),
            ])
            .style(row_style)
        })
        .collect();

    let widths = [
        Constraint::Length(21),
        Constraint::Length(8),
        Constraint::Min(12),
    ];
    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}
