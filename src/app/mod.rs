mod player;
mod quest;
mod tui;


use anyhow::Result;
use chrono::{DateTime, Local};

use crate::cli::{Cli, Command};
use crate::db::{Database, SavedQuest};
use crate::paths::database_file_path;

use self::quest::{QuestConfig, validate_playlist_id};
use self::tui::{Launch, run_tui};

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db()?;

    match cli.command {
        Some(Command::Start { playlist_id }) => run_start(&db, &playlist_id)?,
        Some(Command::Resume) => run_resume(&db)?,
        Some(Command::Status) => run_status(&db)?,
        Some(Command::Abandon) => run_abandon(&db)?,
        Some(Command::Tui) | None => run_tui(&db, QuestConfig::from_env(), Launch::Menu)?,
    }

    Ok(())
}

fn run_start(db: &Database, raw_id: &str) -> Result<()> {
    let Some(playlist_id) = validate_playlist_id(raw_id) else {
        println!("Invalid playlist id. Expected a full id such as PLuJllDsJjN9LaDwTCzI_MIaJ0v4oz6xQX.");
        return Ok(());
    };
    run_tui(db, QuestConfig::from_env(), Launch::NewQuest(playlist_id))
}

fn run_resume(db: &Database) -> Result<()> {
    match load_saved(db) {
        Some(saved) => run_tui(db, QuestConfig::from_env(), Launch::Resume(saved.snapshot)),
        None => {
            println!("No saved quest to resume. Start one with `ludio start <PLAYLIST_ID>`.");
            Ok(())
        }
    }
}

fn run_status(db: &Database) -> Result<()> {
    match load_saved(db) {
        Some(saved) => {
            println!("Saved quest:");
            println!("  Playlist  {}", saved.snapshot.playlist_id);
            println!("  XP        {} points", saved.snapshot.points);
            match &saved.snapshot.next_page_token {
                Some(token) => println!("  Cursor    {token} (more tracks beyond the fetched pages)"),
                None => println!("  Cursor    none (playlist fully fetched)"),
            }
            if let Some(limit) = saved.snapshot.visible_limit {
                println!("  Revealed  first {limit} tracks");
            }
            println!("  Saved at  {}", format_saved_at_display(&saved.saved_at));
        }
        None => println!("No saved quest."),
    }
    Ok(())
}

fn run_abandon(db: &Database) -> Result<()> {
    match load_saved(db) {
        Some(saved) => {
            db.clear_snapshot()?;
            println!(
                "Abandoned quest {} ({} points dropped).",
                saved.snapshot.playlist_id, saved.snapshot.points
            );
        }
        None => println!("No saved quest to abandon."),
    }
    Ok(())
}

/// Snapshot reads are best-effort: an unreadable snapshot is reported as a
/// warning and treated as absent, never as a fatal error.
fn load_saved(db: &Database) -> Option<SavedQuest> {
    match db.load_snapshot() {
        Ok(saved) => saved,
        Err(err) => {
            eprintln!("Warning: {err}");
            None
        }
    }
}

fn format_saved_at_display(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn open_db() -> Result<Database> {
    let path = database_file_path()?;
    let db = Database::open(&path)?;
    db.migrate()?;
    Ok(db)
}
