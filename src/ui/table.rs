use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    prelude::*,
    widgets::*,
};

use crate::monitor::{ProcessRecord, SortKey};
use crate::ui::theme::Theme;

/// The searchable, sortable process table.
pub struct ProcessTable<'a> {
    pub records: &'a [ProcessRecord],
    pub selected: Option<usize>,
    pub sort_key: SortKey,
    pub theme: &'a Theme,
}

impl Widget for ProcessTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new([
            "Name",
            "PID",
            "CPU %",
            "Mem (MB)",
            "I/O (KB/s)",
            "Conns",
            "Owner",
        ])
        .style(
            Style::default()
                .fg(self.theme.primary)
                .add_modifier(Modifier::BOLD),
        );
        let rows = self.records.iter().map(|record| {
            Row::new([
                Cell::from(record.name.clone()),
                Cell::from(record.pid.to_string()),
                Cell::from(format!("{:.1}", record.cpu_percent)),
                Cell::from(format!("{:.1}", record.memory_mb)),
                Cell::from(format!("{:.1}", record.io_rate_kbs)),
                Cell::from(record.connection_count.to_string()),
                Cell::from(record.owner.clone().unwrap_or_else(|| "-".to_string())),
            ])
        });
        let widths = [
            Constraint::Fill(1),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(12),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::bordered()
                    .title(format!(" Processes ({}) ", self.records.len()))
                    .title(
                        Span::from(format!(" sort: {} ", self.sort_key.label()))
                            .fg(self.theme.accent),
                    )
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.foreground)),
            )
            .style(
                Style::default()
                    .bg(self.theme.background)
                    .fg(self.theme.foreground),
            )
            .row_highlight_style(
                Style::default()
                    .bg(self.theme.surface)
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        let mut state = TableState::default().with_selected(self.selected);
        StatefulWidget::render(table, area, buf, &mut state);
    }
}

/// Search input line; doubles as the window title bar.
pub struct SearchBar<'a> {
    pub query: &'a str,
    pub searching: bool,
    pub title: &'a str,
    pub theme: &'a Theme,
}

impl Widget for SearchBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_color = if self.searching {
            self.theme.accent
        } else {
            self.theme.foreground
        };
        let cursor = if self.searching { "_" } else { "" };
        Paragraph::new(Line::from(vec![
            Span::from("Search: ").fg(self.theme.primary),
            Span::from(format!("{}{}", self.query, cursor)),
        ]))
        .block(
            Block::bordered()
                .title(format!(" {} ", self.title))
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border_color)),
        )
        .style(
            Style::default()
                .bg(self.theme.background)
                .fg(self.theme.foreground),
        )
        .render(area, buf);
    }
}

/// One-line status strip: last refresh, control results, cycle errors.
pub struct StatusBar<'a> {
    pub status: &'a str,
    pub theme: &'a Theme,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.status)
            .style(
                Style::default()
                    .bg(self.theme.surface)
                    .fg(self.theme.foreground),
            )
            .render(area, buf);
    }
}
