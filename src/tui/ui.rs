//! TUI rendering functions.

use crate::client::connection::ConnectionState;
use crate::common::types::{format_duration_ago, truncate, SessionStatus};
use crate::tui::app::App;
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Width of the alert column
const ALERTS_WIDTH: u16 = 44;

/// Build the ratatui UI
pub fn ui(frame: &mut Frame, app: &mut App) {
    app.clear_old_status();
    let area = frame.area();

    let status_height = if app.status_message.is_some() { 1 } else { 0 };
    let log_height = if app.focused.is_some() { area.height / 3 } else { 0 };

    let chunks = Layout::vertical([
        Constraint::Length(1),             // header
        Constraint::Min(0),                // sessions + alerts
        Constraint::Length(log_height),    // live output of the focused session
        Constraint::Length(status_height), // status message (if any)
        Constraint::Length(1),             // footer
    ])
    .split(area);

    render_header(frame, app, chunks[0]);

    let show_alerts = area.width >= 80;
    if show_alerts {
        let columns = Layout::horizontal([Constraint::Min(30), Constraint::Length(ALERTS_WIDTH)]).split(chunks[1]);
        render_session_list(frame, app, columns[0]);
        render_alerts(frame, app, columns[1]);
    } else {
        render_session_list(frame, app, chunks[1]);
    }

    if app.focused.is_some() {
        render_session_log(frame, app, chunks[2]);
    }

    if let Some((ref msg, _)) = app.status_message {
        let line = Line::from(Span::styled(
            msg.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(line), chunks[3]);
    }

    let settings = app.store.settings();
    let footer = Line::from(vec![
        Span::styled(
            "j/k move  Enter focus  Esc unfocus  d dismiss  c clear  ",
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::styled(
            format!("s sound:{}  ", on_off(settings.sound_enabled)),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::styled(
            format!("n notify:{}  ", on_off(settings.browser_notifications)),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::styled("v verbose  q quit", Style::default().add_modifier(Modifier::DIM)),
    ]);
    frame.render_widget(Paragraph::new(footer), chunks[4]);
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let connection = match app.connection {
        ConnectionState::Open => Span::styled("[connected]", Style::default().fg(Color::Green)),
        ConnectionState::Connecting => Span::styled("[connecting]", Style::default().fg(Color::Yellow)),
        ConnectionState::Closed => Span::styled("[disconnected]", Style::default().fg(Color::Red)),
    };

    let mut spans = vec![
        Span::styled("claude-dash", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        connection,
        Span::raw("  "),
        Span::styled(app.server.clone(), Style::default().add_modifier(Modifier::DIM)),
    ];
    if let Some(stats) = app.dashboard.stats() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!(
                "{} sessions ({} active) · {} pending · {} projects",
                stats.total_sessions, stats.active_sessions, stats.pending_hooks, stats.project_count
            ),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn render_session_list(frame: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now();
    let width = area.width.saturating_sub(4) as usize;
    let mut lines: Vec<Line> = Vec::new();

    if app.dashboard.sessions().is_empty() {
        lines.push(Line::styled(
            "  No sessions",
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    // Two lines per session; keep the selection on screen
    let per_page = (area.height.saturating_sub(2) as usize / 2).max(1);
    let skip = app.selected.saturating_sub(per_page - 1);

    for (idx, session) in app.dashboard.sessions().iter().enumerate().skip(skip).take(per_page) {
        let is_selected = idx == app.selected;
        let is_focused = app.focused.as_deref() == Some(session.id.as_str());
        let style = if is_selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let (marker, marker_color) = match session.status {
            SessionStatus::Active => ("●", Color::Green),
            SessionStatus::Idle => ("○", Color::DarkGray),
            SessionStatus::PendingHook => ("!", Color::Yellow),
        };

        let mut header = vec![
            Span::styled(format!("{} ", marker), Style::default().fg(marker_color)),
            Span::styled(session.project_name.clone(), style.add_modifier(Modifier::BOLD)),
        ];
        if let Some(ref branch) = session.branch {
            header.push(Span::styled(format!(" ({})", branch), Style::default().fg(Color::Cyan)));
        }
        header.push(Span::styled(
            format!("  {} msgs, {}", session.message_count, format_duration_ago(&session.last_activity, now)),
            Style::default().add_modifier(Modifier::DIM),
        ));
        if is_focused {
            header.push(Span::styled("  [live]", Style::default().fg(Color::Magenta)));
        }
        lines.push(Line::from(header));

        let detail = match (&session.pending_hook, &session.last_message) {
            (Some(hook), _) => Span::styled(
                format!(
                    "   → {} {}",
                    hook.hook_type.label(),
                    truncate(hook.preview.as_deref().unwrap_or(&hook.tool_name), width)
                ),
                Style::default().fg(Color::Yellow),
            ),
            (None, Some(message)) => Span::styled(
                format!("   {}", truncate(message, width)),
                Style::default().add_modifier(Modifier::DIM),
            ),
            (None, None) => Span::styled(
                format!("   {}", truncate(&session.cwd, width)),
                Style::default().add_modifier(Modifier::DIM),
            ),
        };
        lines.push(Line::from(detail));
    }

    let block = Block::default().borders(Borders::ALL).title(" Sessions ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_alerts(frame: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now();
    let width = area.width.saturating_sub(4) as usize;
    let mut lines: Vec<Line> = Vec::new();

    for alert in app.store.alerts().take(area.height.saturating_sub(2) as usize / 2) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", alert.hook.hook_type.label()),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(truncate(&alert.session_name, width.saturating_sub(12))),
            Span::styled(
                format!(" {}", format_duration_ago(&alert.received_at, now)),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]));
        let detail = alert.hook.preview.as_deref().unwrap_or(&alert.hook.tool_name);
        lines.push(Line::styled(
            format!("  {}", truncate(detail, width.saturating_sub(2))),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    let title = format!(" Alerts {}/{} ", app.store.len(), app.store.max_size());
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_session_log(frame: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.session_log.len().saturating_sub(visible);
    let lines: Vec<Line> = app
        .session_log
        .iter()
        .skip(skip)
        .map(|l| Line::raw(l.clone()))
        .collect();

    let title = match app.focused.as_deref().and_then(|id| app.dashboard.session(id)) {
        Some(session) => format!(" Live: {} ", session.project_name),
        None => " Live ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
