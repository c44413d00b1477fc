use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::db::QuestSnapshot;

use super::super::quest::QuestEngine;
use super::{FloatingBadge, InputForm};

const ACCENT: Color = Color::Rgb(0, 255, 170);
const DIM_TEXT: Color = Color::Rgb(185, 195, 210);
const PANEL_BORDER: Color = Color::Rgb(125, 135, 150);

#[allow(clippy::too_many_arguments)]
pub(super) fn draw_tui(
    frame: &mut Frame,
    engine: &QuestEngine,
    form: &InputForm,
    saved: Option<&QuestSnapshot>,
    table_state: &mut TableState,
    status: &str,
    missing_key: bool,
    badges: &[FloatingBadge],
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, engine, chunks[0]);

    if engine.has_quest() {
        draw_quest_body(frame, engine, table_state, chunks[1]);
    } else {
        draw_login_form(frame, form, saved, missing_key, chunks[1]);
    }

    let hints = if engine.has_quest() {
        "↑/↓ select  Enter play  Space pause  n next  p previous  u unlock  click +1 XP  q quit"
    } else {
        "type playlist id  Enter load  Tab resume saved  Esc quit"
    };
    let command_bar = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", engine.playback_status().label()),
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("   {hints}"), Style::default().fg(DIM_TEXT)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if engine.is_loading() {
        draw_loading_overlay(frame);
    }

    for badge in badges {
        draw_badge(frame, badge);
    }
}

fn draw_header(frame: &mut Frame, engine: &QuestEngine, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "LUDIO",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("QUEST XP: {}", engine.points()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} missions unlocked", engine.visible_count()),
            Style::default().fg(DIM_TEXT),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            engine.config().policy.label(),
            Style::default().fg(DIM_TEXT),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Quest Log"));
    frame.render_widget(header, area);
}

fn draw_quest_body(frame: &mut Frame, engine: &QuestEngine, table_state: &mut TableState, area: Rect) {
    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(area);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let current = engine.current_index();
    let rows: Vec<Row> = engine
        .visible_tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if index == current { "♪" } else { " " };
            let row = Row::new(vec![
                Cell::from(format!("{marker} {}", index + 1)),
                Cell::from(truncate(&track.title, 48)),
                Cell::from(truncate(&track.channel_title, 24)),
                Cell::from(track.duration.clone()),
            ]);
            if index == current {
                row.style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Percentage(58),
            Constraint::Percentage(30),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["#", "Title", "Channel", "Length"]).style(
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block("Track Log"))
    .row_highlight_style(
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let now_playing = match engine.current_track() {
        Some(track) => format!(
            "Now Playing\n{}\n\nChannel\n{}\n\nLength\n{}\n\nItem Id\n{}\n\nArt\n{}",
            truncate(&track.title, 38),
            truncate(&track.channel_title, 38),
            track.duration,
            truncate(&track.id, 28),
            truncate(&track.thumbnail_url, 38),
        ),
        None => "No track selected.".to_string(),
    };
    let selection = Paragraph::new(now_playing)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Player"))
        .alignment(Alignment::Left);
    frame.render_widget(selection, details_chunks[0]);

    let threshold = engine.unlock_threshold().max(1);
    let points = engine.points();
    let ratio = (f64::from(points.min(threshold)) / f64::from(threshold)).clamp(0.0, 1.0);
    let progress = Gauge::default()
        .block(panel_block("Next Unlock"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(255, 105, 180))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(unlock_label(engine))
        .ratio(ratio);
    frame.render_widget(progress, details_chunks[1]);
}

fn unlock_label(engine: &QuestEngine) -> String {
    let exhausted = engine.next_page_token().is_none()
        && engine.visible_count() >= engine.track_count();
    if engine.track_count() >= engine.config().max_tracks {
        format!("MAX MISSIONS REACHED ({})", engine.config().max_tracks)
    } else if exhausted {
        "PLAYLIST FULLY UNLOCKED".to_string()
    } else if engine.can_unlock() {
        "press u to unlock".to_string()
    } else {
        format!("{}/{} XP", engine.points(), engine.unlock_threshold())
    }
}

fn draw_login_form(
    frame: &mut Frame,
    form: &InputForm,
    saved: Option<&QuestSnapshot>,
    missing_key: bool,
    area: Rect,
) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Enter a YouTube playlist id (PL...)",
            Style::default().fg(DIM_TEXT),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(ACCENT)),
            Span::styled(
                format!("{}█", form.buffer),
                Style::default().fg(Color::White),
            ),
        ]),
    ];
    if let Some(feedback) = &form.feedback {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            feedback.clone(),
            Style::default().fg(Color::Rgb(255, 145, 120)),
        )));
    }
    if let Some(snapshot) = saved {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "Previous data found: {} XP on {}... (Tab to resume)",
                snapshot.points,
                truncate(&snapshot.playlist_id, 12)
            ),
            Style::default().fg(Color::Yellow),
        )));
    }
    if missing_key {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "ACCESS DENIED: set LUDIO_API_KEY before loading quest data.",
            Style::default()
                .fg(Color::Rgb(255, 90, 90))
                .add_modifier(Modifier::BOLD),
        )));
    }

    let height = (lines.len() as u16).saturating_add(4).max(10);
    let popup_area = centered_fixed_rect(64, height, area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block("System Login"));
    frame.render_widget(popup, popup_area);
}

fn draw_loading_overlay(frame: &mut Frame) {
    let popup_area = centered_fixed_rect(48, 7, frame.area());
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new("LOADING QUEST DATA...\n\nPLEASE STAND BY")
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(modal_block("Fetching"));
    frame.render_widget(popup, popup_area);
}

fn draw_badge(frame: &mut Frame, badge: &FloatingBadge) {
    let area = frame.area();
    if area.width < 7 || area.height < 1 {
        return;
    }
    let badge_area = Rect::new(
        badge.column.min(area.width.saturating_sub(7)),
        badge.row.min(area.height.saturating_sub(1)),
        6,
        1,
    );
    frame.render_widget(Clear, badge_area);
    let marker = Paragraph::new("+1 XP").style(
        Style::default()
            .fg(Color::Black)
            .bg(ACCENT)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(marker, badge_area);
}

fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(PANEL_BORDER))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}
