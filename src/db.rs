use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

const SNAPSHOT_KEY: &str = "quest";

/// Progression snapshot persisted between sessions. The track list itself is
/// never stored; resuming re-fetches page one from the saved playlist id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestSnapshot {
    pub points: u32,
    pub playlist_id: String,
    pub next_page_token: Option<String>,
    pub visible_limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SavedQuest {
    pub snapshot: QuestSnapshot,
    pub saved_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS quest_snapshot (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Best-effort write of the current progression snapshot. Refuses to
    /// store a snapshot with no playlist id; there is nothing to resume from.
    pub fn save_snapshot(&self, snapshot: &QuestSnapshot) -> Result<()> {
        if snapshot.playlist_id.trim().is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO quest_snapshot (key, body, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                body = excluded.body,
                saved_at = excluded.saved_at
            "#,
            params![SNAPSHOT_KEY, snapshot_to_json(snapshot), now],
        )?;
        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<Option<SavedQuest>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT body, saved_at FROM quest_snapshot WHERE key = ?1",
                params![SNAPSHOT_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((body, saved_at)) = row else {
            return Ok(None);
        };
        let snapshot = snapshot_from_json(&body)
            .ok_or_else(|| anyhow!("stored quest snapshot is not decodable: {body}"))?;
        Ok(Some(SavedQuest { snapshot, saved_at }))
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM quest_snapshot WHERE key = ?1",
            params![SNAPSHOT_KEY],
        )?;
        Ok(())
    }
}

fn snapshot_to_json(snapshot: &QuestSnapshot) -> String {
    let mut body = serde_json::Map::new();
    body.insert("points".to_string(), Value::from(snapshot.points));
    body.insert(
        "playlistId".to_string(),
        Value::from(snapshot.playlist_id.clone()),
    );
    body.insert(
        "nextPageToken".to_string(),
        match &snapshot.next_page_token {
            Some(token) => Value::from(token.clone()),
            None => Value::Null,
        },
    );
    if let Some(limit) = snapshot.visible_limit {
        body.insert("visibleSongsLimit".to_string(), Value::from(limit as u64));
    }
    Value::Object(body).to_string()
}

fn snapshot_from_json(raw: &str) -> Option<QuestSnapshot> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    let playlist_id = parsed.get("playlistId")?.as_str()?.trim().to_string();
    if playlist_id.is_empty() {
        return None;
    }
    let points = parsed.get("points").and_then(Value::as_u64).unwrap_or(0) as u32;
    let next_page_token = parsed
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);
    let visible_limit = parsed
        .get("visibleSongsLimit")
        .and_then(Value::as_u64)
        .map(|limit| limit as usize);
    Some(QuestSnapshot {
        points,
        playlist_id,
        next_page_token,
        visible_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> QuestSnapshot {
        QuestSnapshot {
            points: 7,
            playlist_id: "PLabc1234567".to_string(),
            next_page_token: Some("T1".to_string()),
            visible_limit: Some(4),
        }
    }

    #[test]
    fn save_then_load_round_trips_snapshot() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");

        let snapshot = sample_snapshot();
        db.save_snapshot(&snapshot).expect("save");
        let loaded = db.load_snapshot().expect("load").expect("snapshot present");

        assert_eq!(loaded.snapshot, snapshot);
        assert!(!loaded.saved_at.is_empty());
    }

    #[test]
    fn save_overwrites_prior_snapshot_under_fixed_key() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");

        db.save_snapshot(&sample_snapshot()).expect("first save");
        let mut updated = sample_snapshot();
        updated.points = 21;
        updated.next_page_token = None;
        db.save_snapshot(&updated).expect("second save");

        let loaded = db.load_snapshot().expect("load").expect("snapshot present");
        assert_eq!(loaded.snapshot.points, 21);
        assert_eq!(loaded.snapshot.next_page_token, None);
    }

    #[test]
    fn clear_then_load_returns_none() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");

        db.save_snapshot(&sample_snapshot()).expect("save");
        db.clear_snapshot().expect("clear");

        assert!(db.load_snapshot().expect("load").is_none());
    }

    #[test]
    fn snapshot_with_empty_playlist_id_is_not_written() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");

        db.save_snapshot(&QuestSnapshot {
            points: 3,
            playlist_id: String::new(),
            next_page_token: None,
            visible_limit: None,
        })
        .expect("save is a no-op");

        assert!(db.load_snapshot().expect("load").is_none());
    }

    #[test]
    fn codec_omits_visible_limit_when_absent() {
        let raw = snapshot_to_json(&QuestSnapshot {
            points: 2,
            playlist_id: "PLxyz7654321".to_string(),
            next_page_token: None,
            visible_limit: None,
        });
        assert!(!raw.contains("visibleSongsLimit"));

        let decoded = snapshot_from_json(&raw).expect("decode");
        assert_eq!(decoded.visible_limit, None);
        assert_eq!(decoded.next_page_token, None);
    }

    #[test]
    fn decode_rejects_malformed_or_id_less_bodies() {
        assert!(snapshot_from_json("not-json").is_none());
        assert!(snapshot_from_json("{\"points\":5}").is_none());
        assert!(snapshot_from_json("{\"points\":5,\"playlistId\":\"  \"}").is_none());
    }
}
