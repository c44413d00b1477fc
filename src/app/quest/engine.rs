use crate::db::{Database, QuestSnapshot};

use super::catalog::CatalogPage;
use super::config::{QuestConfig, UnlockPolicy};
use super::{FetchError, PlaybackStatus, Track};

/// A fetch the caller must run. The generation tag identifies the quest the
/// fetch belongs to; a completion carrying an older generation is discarded
/// so a slow first page can never clobber a newer quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchRequest {
    pub(crate) generation: u64,
    pub(crate) playlist_id: String,
    pub(crate) page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayCommand {
    pub(crate) index: usize,
    pub(crate) video_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportCommand {
    Pause,
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnlockOutcome {
    /// Gate condition not met. A user-visible no-op, not an error.
    Rejected,
    Unlocked { fetch: Option<FetchRequest> },
}

/// Transient acknowledgment for an ambient-interaction grant. The
/// presentation layer displays it at the given screen position and drops it
/// after about a second; the engine only mints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClickBadge {
    pub(crate) id: u64,
    pub(crate) column: u16,
    pub(crate) row: u16,
}

/// The quest progression state machine. Owns the authoritative in-memory
/// state and writes a best-effort snapshot through the database after every
/// points/cursor/identifier change. All mutation happens on the caller's
/// thread in response to discrete events.
pub(crate) struct QuestEngine<'a> {
    config: QuestConfig,
    db: &'a Database,
    playlist_id: String,
    tracks: Vec<Track>,
    next_page_token: Option<String>,
    points: u32,
    visible_limit: usize,
    current_index: usize,
    playback_status: PlaybackStatus,
    loading: bool,
    fetch_generation: u64,
    next_badge_id: u64,
    pending_warning: Option<String>,
}

impl<'a> QuestEngine<'a> {
    pub(crate) fn new(config: QuestConfig, db: &'a Database) -> Self {
        let initial_visible = config.initial_visible;
        Self {
            config,
            db,
            playlist_id: String::new(),
            tracks: Vec::new(),
            next_page_token: None,
            points: 0,
            visible_limit: initial_visible,
            current_index: 0,
            playback_status: PlaybackStatus::Uninitialized,
            loading: false,
            fetch_generation: 0,
            next_badge_id: 0,
            pending_warning: None,
        }
    }

    pub(crate) fn config(&self) -> &QuestConfig {
        &self.config
    }

    pub(crate) fn has_quest(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn points(&self) -> u32 {
        self.points
    }

    pub(crate) fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub(crate) fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn playback_status(&self) -> PlaybackStatus {
        self.playback_status
    }

    pub(crate) fn set_playback_status(&mut self, status: PlaybackStatus) {
        self.playback_status = status;
    }

    /// Number of tracks the presentation layer may show. Under the per-track
    /// policy the reveal limit applies; it may briefly exceed the fetched
    /// count while a page is in flight, so clamp.
    pub(crate) fn visible_count(&self) -> usize {
        match self.config.policy {
            UnlockPolicy::Batch => self.tracks.len(),
            UnlockPolicy::PerTrack => self.visible_limit.min(self.tracks.len()),
        }
    }

    pub(crate) fn visible_tracks(&self) -> &[Track] {
        &self.tracks[..self.visible_count()]
    }

    pub(crate) fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Warning from a swallowed persistence failure, if one happened since
    /// the last call. Durability is best-effort; these never fail the quest.
    pub(crate) fn take_warning(&mut self) -> Option<String> {
        self.pending_warning.take()
    }

    /// Full reset for a new quest: all progression state cleared, the saved
    /// snapshot deleted, and a first-page fetch issued. Ignored while a
    /// fetch is already outstanding.
    pub(crate) fn begin_quest(&mut self, playlist_id: &str) -> Option<FetchRequest> {
        if self.loading {
            return None;
        }
        self.playlist_id = playlist_id.to_string();
        self.tracks.clear();
        self.next_page_token = None;
        self.points = 0;
        self.visible_limit = self.config.initial_visible;
        self.current_index = 0;
        self.playback_status = PlaybackStatus::Uninitialized;
        if let Err(err) = self.db.clear_snapshot() {
            self.pending_warning = Some(format!("failed to clear saved quest: {err}"));
        }
        Some(self.issue_fetch(None))
    }

    /// Pick up a saved quest: points and reveal limit carry over, the track
    /// list does not. Page one is re-fetched and played from index 0.
    pub(crate) fn resume_quest(&mut self, snapshot: &QuestSnapshot) -> Option<FetchRequest> {
        if self.loading {
            return None;
        }
        self.playlist_id = snapshot.playlist_id.clone();
        self.tracks.clear();
        self.next_page_token = None;
        self.points = snapshot.points;
        self.visible_limit = snapshot
            .visible_limit
            .unwrap_or(self.config.initial_visible);
        self.current_index = 0;
        self.playback_status = PlaybackStatus::Uninitialized;
        Some(self.issue_fetch(None))
    }

    fn issue_fetch(&mut self, page_token: Option<String>) -> FetchRequest {
        self.loading = true;
        self.fetch_generation += 1;
        FetchRequest {
            generation: self.fetch_generation,
            playlist_id: self.playlist_id.clone(),
            page_token,
        }
    }

    /// Points required for the unlock gate to open. Under the batch policy
    /// the threshold scales with how many batches are already fetched.
    pub(crate) fn unlock_threshold(&self) -> u32 {
        match self.config.policy {
            UnlockPolicy::Batch => {
                let fetched_batches = (self.tracks.len() / self.config.unlock_batch_size) as u32;
                self.config.unlock_cost * (fetched_batches + 1)
            }
            UnlockPolicy::PerTrack => self.config.unlock_cost,
        }
    }

    pub(crate) fn can_unlock(&self) -> bool {
        if self.tracks.is_empty() || self.loading {
            return false;
        }
        match self.config.policy {
            UnlockPolicy::Batch => {
                self.points >= self.unlock_threshold()
                    && self.next_page_token.is_some()
                    && self.tracks.len() < self.config.max_tracks
            }
            UnlockPolicy::PerTrack => {
                let more_to_reveal = self.visible_limit < self.tracks.len()
                    || (self.next_page_token.is_some()
                        && self.tracks.len() < self.config.max_tracks);
                self.points >= self.config.unlock_cost
                    && more_to_reveal
                    && self.visible_limit < self.config.max_tracks
            }
        }
    }

    pub(crate) fn request_unlock(&mut self) -> UnlockOutcome {
        if !self.can_unlock() {
            return UnlockOutcome::Rejected;
        }
        match self.config.policy {
            UnlockPolicy::Batch => {
                let token = self.next_page_token.clone();
                UnlockOutcome::Unlocked {
                    fetch: Some(self.issue_fetch(token)),
                }
            }
            UnlockPolicy::PerTrack => {
                self.points -= self.config.unlock_cost;
                self.visible_limit += 1;
                let fetch = if self.visible_limit > self.tracks.len()
                    && self.next_page_token.is_some()
                    && self.tracks.len() < self.config.max_tracks
                {
                    let token = self.next_page_token.clone();
                    Some(self.issue_fetch(token))
                } else {
                    None
                };
                self.persist();
                UnlockOutcome::Unlocked { fetch }
            }
        }
    }

    /// The primary passive-earning path: a finished track always grants the
    /// configured reward, then playback advances to the next track.
    pub(crate) fn on_playback_ended(&mut self) -> Option<PlayCommand> {
        if self.tracks.is_empty() {
            return None;
        }
        self.playback_status = PlaybackStatus::Ended;
        self.points = self.points.saturating_add(self.config.listen_reward);
        self.persist();
        let len = self.visible_count();
        let next = (self.current_index + 1) % len;
        self.play(next)
    }

    /// Ambient-interaction grant, gated on an active quest.
    pub(crate) fn grant_manual_point(&mut self, column: u16, row: u16) -> Option<ClickBadge> {
        if self.tracks.is_empty() {
            return None;
        }
        self.points = self.points.saturating_add(1);
        self.persist();
        self.next_badge_id += 1;
        Some(ClickBadge {
            id: self.next_badge_id,
            column,
            row,
        })
    }

    pub(crate) fn play(&mut self, index: usize) -> Option<PlayCommand> {
        let track = self.visible_tracks().get(index)?;
        let command = PlayCommand {
            index,
            video_id: track.video_id.clone(),
        };
        self.current_index = index;
        Some(command)
    }

    pub(crate) fn next(&mut self) -> Option<PlayCommand> {
        let len = self.visible_count();
        if len == 0 {
            return None;
        }
        self.play((self.current_index + 1) % len)
    }

    pub(crate) fn previous(&mut self) -> Option<PlayCommand> {
        let len = self.visible_count();
        if len == 0 {
            return None;
        }
        self.play((self.current_index + len - 1) % len)
    }

    /// Transport toggle is a function of the current status, never a
    /// separate boolean.
    pub(crate) fn toggle_play_pause(&self) -> Option<TransportCommand> {
        match self.playback_status {
            PlaybackStatus::Playing => Some(TransportCommand::Pause),
            PlaybackStatus::Paused => Some(TransportCommand::Resume),
            PlaybackStatus::Uninitialized
            | PlaybackStatus::Ready
            | PlaybackStatus::Ended => None,
        }
    }

    /// Apply a fetch completion. Stale generations are dropped unseen. A
    /// failure invalidates the active quest (fail-fast: no partial quest is
    /// retained); the saved snapshot is left untouched so a later resume can
    /// still try again.
    pub(crate) fn apply_fetch(
        &mut self,
        generation: u64,
        result: Result<CatalogPage, FetchError>,
    ) -> Result<Option<PlayCommand>, FetchError> {
        if generation != self.fetch_generation {
            return Ok(None);
        }
        self.loading = false;
        match result {
            Ok(page) => {
                let first_page = self.tracks.is_empty();
                self.tracks.extend(page.tracks);
                self.next_page_token = page.next_page_token;
                self.persist();
                if first_page && !self.tracks.is_empty() {
                    Ok(self.play(0))
                } else {
                    Ok(None)
                }
            }
            Err(err) => {
                self.invalidate();
                Err(err)
            }
        }
    }

    fn invalidate(&mut self) {
        self.playlist_id.clear();
        self.tracks.clear();
        self.next_page_token = None;
        self.current_index = 0;
        self.playback_status = PlaybackStatus::Uninitialized;
    }

    fn persist(&mut self) {
        if self.playlist_id.is_empty() {
            return;
        }
        let snapshot = QuestSnapshot {
            points: self.points,
            playlist_id: self.playlist_id.clone(),
            next_page_token: self.next_page_token.clone(),
            visible_limit: match self.config.policy {
                UnlockPolicy::PerTrack => Some(self.visible_limit),
                UnlockPolicy::Batch => None,
            },
        };
        if let Err(err) = self.db.save_snapshot(&snapshot) {
            self.pending_warning = Some(format!("failed to save quest progress: {err}"));
        }
    }
}
