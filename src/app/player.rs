use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, Stdio};
use std::sync::mpsc;

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlayerEvent {
    Playing,
    Paused,
    Ended,
    Failed(String),
}

/// External-player collaborator. Owns the child process playing the current
/// track and a monitor thread watching for its exit; status transitions
/// surface through an event channel drained by the caller's event loop.
/// Events are tagged with a load generation so a torn-down child's exit can
/// never register as the current track ending.
pub(crate) struct PlayerBridge {
    bin: PathBuf,
    child_pid: Option<u32>,
    generation: u64,
    paused: bool,
    tx: mpsc::Sender<(u64, PlayerEvent)>,
    rx: mpsc::Receiver<(u64, PlayerEvent)>,
}

impl PlayerBridge {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            bin: resolve_player_bin(),
            child_pid: None,
            generation: 0,
            paused: false,
            tx,
            rx,
        }
    }

    /// Replace whatever is playing with the given video. The previous child,
    /// if any, is torn down first; its exit event is filtered out by
    /// generation.
    pub(crate) fn load(&mut self, video_id: &str) -> Result<()> {
        self.stop();
        self.generation += 1;
        let generation = self.generation;

        let url = watch_url(video_id);
        let mut child = ProcessCommand::new(&self.bin)
            .arg("--no-video")
            .arg("--really-quiet")
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.bin.display()))?;
        self.child_pid = Some(child.id());
        self.paused = false;

        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let event = match child.wait() {
                Ok(status) if status.success() => PlayerEvent::Ended,
                Ok(status) => PlayerEvent::Failed(format!("player exited with status: {status}")),
                Err(err) => PlayerEvent::Failed(format!("failed waiting on player: {err}")),
            };
            let _ = tx.send((generation, event));
        });

        let _ = self.tx.send((generation, PlayerEvent::Playing));
        Ok(())
    }

    /// Drain pending status transitions for the currently loaded track.
    pub(crate) fn try_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok((generation, event)) = self.rx.try_recv() {
            if generation != self.generation {
                continue;
            }
            if matches!(event, PlayerEvent::Ended | PlayerEvent::Failed(_)) {
                self.child_pid = None;
                self.paused = false;
            }
            events.push(event);
        }
        events
    }

    #[cfg(unix)]
    pub(crate) fn pause(&mut self) {
        if self.paused {
            return;
        }
        if let Some(pid) = self.child_pid
            && send_signal(pid, libc::SIGSTOP)
        {
            self.paused = true;
            let _ = self.tx.send((self.generation, PlayerEvent::Paused));
        }
    }

    #[cfg(not(unix))]
    pub(crate) fn pause(&mut self) {}

    #[cfg(unix)]
    pub(crate) fn resume(&mut self) {
        if !self.paused {
            return;
        }
        if let Some(pid) = self.child_pid
            && send_signal(pid, libc::SIGCONT)
        {
            self.paused = false;
            let _ = self.tx.send((self.generation, PlayerEvent::Playing));
        }
    }

    #[cfg(not(unix))]
    pub(crate) fn resume(&mut self) {}

    #[cfg(unix)]
    pub(crate) fn stop(&mut self) {
        if let Some(pid) = self.child_pid.take() {
            // A stopped child cannot act on SIGKILL until continued.
            send_signal(pid, libc::SIGCONT);
            send_signal(pid, libc::SIGKILL);
        }
        self.paused = false;
    }

    #[cfg(not(unix))]
    pub(crate) fn stop(&mut self) {
        self.child_pid = None;
        self.paused = false;
    }
}

impl Drop for PlayerBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, signal) == 0 }
}

pub(crate) fn resolve_player_bin() -> PathBuf {
    resolve_player_bin_from_env(env::var_os("LUDIO_PLAYER_BIN"))
}

pub(crate) fn resolve_player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("mpv"),
    }
}

pub(crate) fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_bin_defaults_to_mpv() {
        assert_eq!(resolve_player_bin_from_env(None), PathBuf::from("mpv"));
        assert_eq!(
            resolve_player_bin_from_env(Some(OsString::new())),
            PathBuf::from("mpv")
        );
        assert_eq!(
            resolve_player_bin_from_env(Some(OsString::from("/usr/local/bin/mpv"))),
            PathBuf::from("/usr/local/bin/mpv")
        );
    }

    #[test]
    fn watch_url_targets_the_video_id() {
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
