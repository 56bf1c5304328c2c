use chatscope_core::models::format_timestamp;
use chatscope_core::viz::TransformStatus;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, FILTER_FIELDS};
use crate::theme;

const SIDE_PANEL_WIDTH: u16 = 38;
const LEGEND_ROWS: usize = 12;

pub(crate) fn render(f: &mut Frame, app: &mut App) {
    let bg = Block::default().style(Style::default().bg(theme::background(app.theme())));
    f.render_widget(bg, f.area());

    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)]).split(f.area());
    let body = Layout::horizontal([Constraint::Min(0), Constraint::Length(SIDE_PANEL_WIDTH)]).split(chunks[1]);

    render_header(f, app, chunks[0]);
    render_canvas(f, app, body[0]);
    render_side_panel(f, app, body[1]);
    render_statusbar(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let chrome = if app.pending_quit { theme::ACCENT_ERROR } else { theme::ACCENT_PRIMARY };
    let mut spans = vec![Span::styled(" chatscope ", Style::default().fg(chrome).add_modifier(Modifier::BOLD))];
    if !app.term.is_empty() || app.mode == InputMode::Search {
        spans.push(Span::styled(" /", theme::muted()));
        spans.push(Span::raw(app.term.clone()));
        if app.mode == InputMode::Search {
            spans.push(Span::styled("▏", Style::default().fg(theme::ACCENT_PRIMARY)));
        }
    }
    if app.pending_quit {
        spans.push(Span::styled("  press Ctrl+C again to quit", Style::default().fg(theme::ACCENT_ERROR)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_canvas(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::hint())
        .title(Span::styled(" time → / time of day ↑ ", theme::muted()));
    let inner = block.inner(area);
    app.set_canvas_area(inner);

    if app.viz.is_empty() {
        let message = if app.loading {
            "Loading snapshot…"
        } else if app.error.is_some() {
            "No data. Press r to retry."
        } else {
            "No data loaded."
        };
        f.render_widget(Paragraph::new(message).style(theme::muted()).block(block), area);
        return;
    }

    let widget = app.viz.renderer().widget(block, app.drag.as_deref());
    f.render_widget(widget, area);
}

fn render_side_panel(f: &mut Frame, app: &App, area: Rect) {
    let rows = if app.mode == InputMode::Filters {
        Layout::vertical([Constraint::Length(6), Constraint::Min(0), Constraint::Length(LEGEND_ROWS as u16 + 2)])
            .split(area)
    } else {
        Layout::vertical([Constraint::Length(0), Constraint::Min(0), Constraint::Length(LEGEND_ROWS as u16 + 2)])
            .split(area)
    };

    if app.mode == InputMode::Filters {
        render_filters(f, app, rows[0]);
    }
    render_details(f, app, rows[1]);
    render_legend(f, app, rows[2]);
}

fn render_filters(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = FILTER_FIELDS
        .iter()
        .zip(&app.filters.values)
        .enumerate()
        .map(|(i, (label, value))| {
            let focused = i == app.filters.focused;
            let style = if focused { theme::title() } else { theme::muted() };
            Line::from(vec![
                Span::styled(format!("{label}: "), style),
                Span::raw(value.clone()),
                Span::raw(if focused { "▏" } else { "" }),
            ])
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::ACCENT_PRIMARY))
        .title(" Filters (Tab, Enter) ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).border_style(theme::hint()).title(" Message ");
    let selection = app.viz.selection();

    let Some(record) = selection
        .hovered
        .or(selection.primary)
        .and_then(|i| app.viz.record(i))
    else {
        let hint = "Click a point, drag to lasso.\n←/→ step through time.";
        f.render_widget(Paragraph::new(hint).style(theme::hint()).block(block), area);
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(record.sender_or_unknown(), theme::title())),
        Line::from(Span::styled(
            record.timestamp_value().map(format_timestamp).unwrap_or_default(),
            theme::muted(),
        )),
    ];
    if let Some(chat) = record.chat() {
        lines.push(Line::from(Span::styled(format!("in {chat}"), theme::muted())));
    }
    lines.push(Line::default());
    if let Some(text) = record.text() {
        lines.push(Line::from(Span::styled(text, Style::default().fg(theme::TEXT_PRIMARY))));
    } else if let Some(count) = record.get("count") {
        lines.push(Line::from(format!("{count} messages")));
    }
    if selection.selected.len() > 1 {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("{} points selected", selection.selected.len()),
            theme::hint(),
        )));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn render_legend(f: &mut Frame, app: &App, area: Rect) {
    let legend = app.viz.legend();
    let mut lines: Vec<Line> = legend
        .iter()
        .take(LEGEND_ROWS)
        .map(|(label, color)| {
            Line::from(vec![
                Span::styled("● ", Style::default().fg(theme::to_color(*color))),
                Span::raw(label.clone()),
            ])
        })
        .collect();
    if legend.len() > LEGEND_ROWS {
        lines.push(Line::from(Span::styled(
            format!("… {} more", legend.len() - LEGEND_ROWS),
            theme::hint(),
        )));
    }
    let block = Block::default().borders(Borders::ALL).border_style(theme::hint()).title(" Senders ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_statusbar(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::horizontal([Constraint::Min(0), Constraint::Length(40)]).split(area);

    let left = if let Some(error) = &app.error {
        Span::styled(format!(" {error}"), Style::default().fg(theme::ACCENT_ERROR))
    } else if let Some(progress) = &app.progress {
        let percent = progress.percent.map(|p| format!("{p:.0}%")).unwrap_or_default();
        Span::styled(
            format!(
                " Downloading {percent} {:.1} MiB ({:.1} MiB/s)",
                progress.received as f64 / 1_048_576.0,
                progress.bytes_per_sec / 1_048_576.0
            ),
            Style::default().fg(theme::ACCENT_WARNING),
        )
    } else if let TransformStatus::Pending { completed, total } = app.transform {
        Span::styled(
            format!(" Preparing points {completed}/{total}"),
            Style::default().fg(theme::ACCENT_WARNING),
        )
    } else if app.searching {
        Span::styled(" Searching…", Style::default().fg(theme::ACCENT_WARNING))
    } else if let Some(status) = &app.status {
        Span::styled(format!(" {status}"), Style::default().fg(theme::ACCENT_SUCCESS))
    } else {
        Span::styled(" / search  f filters  m multi  t theme  q quit", theme::hint())
    };
    f.render_widget(Paragraph::new(Line::from(left)), columns[0]);

    let selection = app.viz.selection();
    let mut right = format!("{} pts", app.viz.len());
    if let Some(matches) = app.match_count {
        right.push_str(&format!(" · {matches} match"));
    }
    if !selection.selected.is_empty() {
        right.push_str(&format!(" · {} sel", selection.selected.len()));
    }
    if selection.multi_select {
        right.push_str(" · multi");
    }
    right.push(' ');
    f.render_widget(
        Paragraph::new(right).alignment(ratatui::layout::Alignment::Right).style(theme::muted()),
        columns[1],
    );
}
