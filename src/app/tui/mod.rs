mod render;
mod session;

use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::db::{Database, QuestSnapshot};

use super::player::{PlayerBridge, PlayerEvent};
use super::quest::{
    CatalogPage, FetchError, FetchRequest, PlayCommand, PlaybackStatus, QuestConfig, QuestEngine,
    TransportCommand, UnlockOutcome, fetch_page, validate_playlist_id,
};

use self::render::draw_tui;
use self::session::TuiSession;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const BADGE_TTL: Duration = Duration::from_millis(1000);

pub(super) enum Launch {
    Menu,
    NewQuest(String),
    Resume(QuestSnapshot),
}

struct FetchOutcome {
    generation: u64,
    result: Result<CatalogPage, FetchError>,
}

pub(super) struct InputForm {
    pub(super) buffer: String,
    pub(super) feedback: Option<String>,
}

/// Cosmetic "+1 XP" marker minted by the engine on an ambient click; shown
/// at the click position until its TTL runs out.
pub(super) struct FloatingBadge {
    pub(super) column: u16,
    pub(super) row: u16,
    born: Instant,
}

pub(super) fn run_tui(db: &Database, config: QuestConfig, launch: Launch) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut engine = QuestEngine::new(config, db);
    let mut bridge = PlayerBridge::new();
    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchOutcome>();

    let mut status = status_info("Enter a playlist id to begin the quest.");
    let mut saved = match db.load_snapshot() {
        Ok(found) => found.map(|entry| entry.snapshot),
        Err(err) => {
            status = status_error(&format!("Saved quest unreadable: {err}"));
            None
        }
    };
    let mut form = InputForm {
        buffer: String::new(),
        feedback: None,
    };
    let mut badges: Vec<FloatingBadge> = Vec::new();
    let mut table_state = TableState::default();
    let missing_key = engine.config().api_key.is_none();

    match launch {
        Launch::Menu => {}
        Launch::NewQuest(playlist_id) => {
            saved = None;
            if let Some(request) = engine.begin_quest(&playlist_id) {
                status = status_info(&format!("Loading quest {playlist_id}..."));
                spawn_fetch(engine.config(), request, &fetch_tx);
            }
        }
        Launch::Resume(snapshot) => {
            if let Some(request) = engine.resume_quest(&snapshot) {
                status = status_info("Resuming saved quest...");
                spawn_fetch(engine.config(), request, &fetch_tx);
            }
        }
    }

    loop {
        while let Ok(outcome) = fetch_rx.try_recv() {
            match engine.apply_fetch(outcome.generation, outcome.result) {
                Ok(Some(command)) => start_playback(&mut bridge, &mut status, &command),
                Ok(None) => {}
                Err(FetchError::MissingApiKey) => {
                    status = status_error("Quest aborted: no API key configured.");
                }
                Err(err) => status = status_error(&format!("Quest aborted: {err}")),
            }
        }

        for player_event in bridge.try_events() {
            match player_event {
                PlayerEvent::Playing => engine.set_playback_status(PlaybackStatus::Playing),
                PlayerEvent::Paused => engine.set_playback_status(PlaybackStatus::Paused),
                PlayerEvent::Ended => {
                    if let Some(command) = engine.on_playback_ended() {
                        start_playback(&mut bridge, &mut status, &command);
                    }
                }
                PlayerEvent::Failed(detail) => {
                    engine.set_playback_status(PlaybackStatus::Ready);
                    status = status_error(&format!("Playback failed: {detail}"));
                }
            }
        }

        if let Some(warning) = engine.take_warning() {
            status = status_error(&warning);
        }

        badges.retain(|badge| badge.born.elapsed() < BADGE_TTL);
        sync_selection(&engine, &mut table_state);

        terminal.draw(|frame| {
            draw_tui(
                frame,
                &engine,
                &form,
                saved.as_ref(),
                &mut table_state,
                &status,
                missing_key,
                &badges,
            )
        })?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Mouse(mouse) => {
                if matches!(mouse.kind, MouseEventKind::Down(_))
                    && let Some(badge) = engine.grant_manual_point(mouse.column, mouse.row)
                {
                    badges.push(FloatingBadge {
                        column: badge.column,
                        row: badge.row,
                        born: Instant::now(),
                    });
                }
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if engine.is_loading() {
                    // The loading overlay gates everything except quitting.
                    if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                        break;
                    }
                    continue;
                }

                if !engine.has_quest() {
                    match key.code {
                        KeyCode::Esc => break,
                        KeyCode::Enter => match validate_playlist_id(&form.buffer) {
                            Some(playlist_id) => {
                                form.feedback = None;
                                form.buffer.clear();
                                saved = None;
                                if let Some(request) = engine.begin_quest(&playlist_id) {
                                    status =
                                        status_info(&format!("Loading quest {playlist_id}..."));
                                    spawn_fetch(engine.config(), request, &fetch_tx);
                                }
                            }
                            None => {
                                form.feedback = Some(
                                    "That does not look like a playlist id (expected PL...)."
                                        .to_string(),
                                );
                            }
                        },
                        KeyCode::Tab => {
                            if let Some(snapshot) = saved.clone()
                                && let Some(request) = engine.resume_quest(&snapshot)
                            {
                                status = status_info("Resuming saved quest...");
                                spawn_fetch(engine.config(), request, &fetch_tx);
                            }
                        }
                        KeyCode::Backspace => {
                            form.buffer.pop();
                        }
                        KeyCode::Char(ch) if !ch.is_control() => form.buffer.push(ch),
                        _ => {}
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Up => {
                        if let Some(selected) = table_state.selected() {
                            table_state.select(Some(selected.saturating_sub(1)));
                        }
                    }
                    KeyCode::Down => {
                        if let Some(selected) = table_state.selected() {
                            let last = engine.visible_count().saturating_sub(1);
                            table_state.select(Some((selected + 1).min(last)));
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(selected) = table_state.selected()
                            && let Some(command) = engine.play(selected)
                        {
                            start_playback(&mut bridge, &mut status, &command);
                        }
                    }
                    KeyCode::Char(' ') => match engine.toggle_play_pause() {
                        Some(TransportCommand::Pause) => bridge.pause(),
                        Some(TransportCommand::Resume) => bridge.resume(),
                        None => {
                            let index = engine.current_index();
                            if let Some(command) = engine.play(index) {
                                start_playback(&mut bridge, &mut status, &command);
                            }
                        }
                    },
                    KeyCode::Char('n') => {
                        if let Some(command) = engine.next() {
                            start_playback(&mut bridge, &mut status, &command);
                        }
                    }
                    KeyCode::Char('p') => {
                        if let Some(command) = engine.previous() {
                            start_playback(&mut bridge, &mut status, &command);
                        }
                    }
                    KeyCode::Char('u') => match engine.request_unlock() {
                        // A closed gate is a user-visible no-op, not an error.
                        UnlockOutcome::Rejected => {}
                        UnlockOutcome::Unlocked { fetch } => {
                            status = status_info("Unlock granted.");
                            if let Some(request) = fetch {
                                spawn_fetch(engine.config(), request, &fetch_tx);
                            }
                        }
                    },
                    _ => {}
                }
            }
            _ => {}
        }
    }

    bridge.stop();
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn sync_selection(engine: &QuestEngine, table_state: &mut TableState) {
    let visible = engine.visible_count();
    if visible == 0 {
        table_state.select(None);
        return;
    }
    match table_state.selected() {
        Some(selected) if selected < visible => {}
        _ => table_state.select(Some(engine.current_index().min(visible - 1))),
    }
}

fn start_playback(bridge: &mut PlayerBridge, status: &mut String, command: &PlayCommand) {
    match bridge.load(&command.video_id) {
        Ok(()) => *status = status_info(&format!("Mission {} engaged.", command.index + 1)),
        Err(err) => *status = status_error(&format!("Failed to launch player: {err}")),
    }
}

fn spawn_fetch(config: &QuestConfig, request: FetchRequest, tx: &mpsc::Sender<FetchOutcome>) {
    let Some(api_key) = config.api_key.clone() else {
        // Refuse to fetch without a credential; the engine turns this into
        // the blocking configuration error.
        let _ = tx.send(FetchOutcome {
            generation: request.generation,
            result: Err(FetchError::MissingApiKey),
        });
        return;
    };
    let page_size = config.page_size;
    let tx = tx.clone();
    std::thread::spawn(move || {
        let result = fetch_page(
            &api_key,
            &request.playlist_id,
            request.page_token.as_deref(),
            page_size,
        );
        let _ = tx.send(FetchOutcome {
            generation: request.generation,
            result,
        });
    });
}

fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}
