//! Rendering for the directory screen: header, search bar, results, detail
//! panel, status line, notices, and the modal add form / delete prompt.

use cybervault::{NoticeKind, ProfileRecord};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Mode};
use crate::form::FormField;

const ACCENT: Color = Color::Rgb(0, 255, 170);
const ACCENT_DIM: Color = Color::Rgb(40, 120, 100);
const TEXT: Color = Color::Rgb(210, 220, 215);
const MUTED: Color = Color::Rgb(120, 135, 130);
const ALERT: Color = Color::Rgb(255, 80, 110);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];
const MAX_CELL_WIDTH: usize = 40;

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, app, rows[0]);
    draw_search(frame, app, rows[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);
    draw_results(frame, app, body[0]);
    draw_detail(frame, app, body[1]);
    draw_status(frame, app, rows[3]);

    draw_notices(frame, app, rows[2]);
    if let Mode::ConfirmDelete { name, .. } = app.mode() {
        draw_confirm(frame, name);
    }
    if app.form().is_some() {
        draw_form(frame, app);
    }
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { ACCENT } else { ACCENT_DIM };
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            title,
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ))
}

fn draw_header(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let controller = app.controller();
    let mut spans = vec![
        Span::styled(
            "CYBERVAULT",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  //  backend: ", Style::default().fg(MUTED)),
        Span::styled(controller.store().backend().as_str(), Style::default().fg(TEXT)),
        Span::styled("  //  records: ", Style::default().fg(MUTED)),
        Span::styled(
            controller.records().len().to_string(),
            Style::default().fg(TEXT),
        ),
    ];
    if controller.is_busy() {
        let spin = SPINNER[app.frame_tick() % SPINNER.len()];
        spans.push(Span::styled(
            format!("  {spin} WORKING"),
            Style::default().fg(ALERT).add_modifier(Modifier::BOLD),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(panel(" Profile directory ", false));
    frame.render_widget(header, area);
}

fn draw_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let focused = *app.mode() == Mode::Search;
    let query = app.controller().query();
    let text = if query.is_empty() && !focused {
        Span::styled("press / to search", Style::default().fg(MUTED))
    } else {
        Span::styled(query, Style::default().fg(TEXT))
    };
    frame.render_widget(
        Paragraph::new(Line::from(text)).block(panel(" Search ", focused)),
        area,
    );
    if focused {
        let width = UnicodeWidthStr::width(query).min(u16::MAX as usize) as u16;
        let x = area
            .x
            .saturating_add(1)
            .saturating_add(width.min(area.width.saturating_sub(2)));
        frame.set_cursor_position((x, area.y + 1));
    }
}

fn draw_results(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let controller = app.controller();
    let visible = controller.visible();
    let title = format!(" SEARCH RESULTS ({}) ", visible.len());
    let block = panel(&title, *app.mode() != Mode::Search);

    if visible.is_empty() {
        let message = if controller.records().is_empty() && controller.query().trim().is_empty() {
            "DATABASE EMPTY"
        } else {
            "NO MATCHES FOUND"
        };
        let empty = Paragraph::new(Span::styled(
            message,
            Style::default().fg(MUTED).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let selected_id = controller.selection().map(|r| r.id.as_str());
    let items: Vec<ListItem> = visible
        .iter()
        .map(|record| {
            let marker = if Some(record.id.as_str()) == selected_id {
                "> "
            } else {
                "  "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(ACCENT)),
                Span::styled(clip(&record.full_name), Style::default().fg(TEXT)),
                Span::styled("  ", Style::default()),
                Span::styled(clip(&record.email), Style::default().fg(MUTED)),
                Span::styled("  ", Style::default()),
                Span::styled(clip(&record.phone_number), Style::default().fg(MUTED)),
            ]))
        })
        .collect();
    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(ACCENT_DIM)
            .add_modifier(Modifier::BOLD),
    );
    let mut state = ListState::default().with_selected(Some(app.cursor()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_detail(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let block = panel(" Profile ", false);
    let Some(record) = app.controller().selection() else {
        let hint = Paragraph::new(Span::styled(
            "Select a record with Enter to view its profile",
            Style::default().fg(MUTED),
        ))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };
    frame.render_widget(Paragraph::new(detail_text(record)).block(block), area);
}

fn detail_text(record: &ProfileRecord) -> Text<'static> {
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<18}"), Style::default().fg(MUTED)),
            Span::styled(value, Style::default().fg(TEXT)),
        ])
    };
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    let photo = match &record.photo {
        Some(_) => "on file".to_string(),
        None => "-".to_string(),
    };
    Text::from(vec![
        row("ID", record.id.clone()),
        row("Full name", record.full_name.clone()),
        row("Email", record.email.clone()),
        row("Phone", record.phone_number.clone()),
        row(
            "Age",
            record.age.map_or_else(|| "-".to_string(), |a| a.to_string()),
        ),
        row("National ID", optional(&record.national_id)),
        row("Driving license", optional(&record.driving_license)),
        row("Residence", optional(&record.residence_address)),
        row("Photo", photo),
        row("Created", record.created_at.to_rfc3339()),
    ])
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let hints = match app.mode() {
        _ if app.form().is_some() => "Tab/Shift+Tab field  Enter save  Esc close",
        Mode::Search => "type to filter  Enter done  Esc clear",
        Mode::ConfirmDelete { .. } => "y confirm  any other key cancels",
        Mode::Browse => "/ search  arrows move  Enter select  a add  d delete  r refresh  q quit",
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hints, Style::default().fg(MUTED))),
        area,
    );
}

fn draw_notices(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let notices: Vec<_> = app.controller().notifier().active().collect();
    if notices.is_empty() {
        return;
    }
    let width = area.width.min(48);
    let height = (notices.len() as u16).saturating_add(2).min(area.height);
    let rect = Rect {
        x: area.x + area.width.saturating_sub(width),
        y: area.y,
        width,
        height,
    };
    let lines: Vec<Line> = notices
        .iter()
        .map(|notice| {
            let color = match notice.kind {
                NoticeKind::Error => ALERT,
                NoticeKind::Success => ACCENT,
                NoticeKind::Info => TEXT,
            };
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", notice.kind.label()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(notice.message.clone(), Style::default().fg(TEXT)),
            ])
        })
        .collect();
    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(panel(" Notices ", false)), rect);
}

fn draw_confirm(frame: &mut Frame<'_>, name: &str) {
    let rect = centered(frame.area(), 56, 3);
    let prompt = Paragraph::new(Span::styled(
        format!("Delete target: {name}? [y/N]"),
        Style::default().fg(ALERT).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(panel(" Confirm ", true));
    frame.render_widget(Clear, rect);
    frame.render_widget(prompt, rect);
}

fn draw_form(frame: &mut Frame<'_>, app: &App) {
    let Some(form) = app.form() else {
        return;
    };
    let height = FormField::ALL.len() as u16 + 2;
    let rect = centered(frame.area(), 64, height);
    let lines: Vec<Line> = FormField::ALL
        .iter()
        .map(|field| {
            let focused = *field == form.focus();
            let label_style = if focused {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(MUTED)
            };
            Line::from(vec![
                Span::styled(format!("{:<26}", field.label()), label_style),
                Span::styled(form.value(*field).to_string(), Style::default().fg(TEXT)),
            ])
        })
        .collect();
    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(panel(" New record ", true)), rect);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn clip(text: &str) -> String {
    if UnicodeWidthStr::width(text) <= MAX_CELL_WIDTH {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > MAX_CELL_WIDTH {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}
