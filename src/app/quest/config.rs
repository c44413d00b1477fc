use std::env;
use std::ffi::OsString;

/// Upstream page size. Distinct from the economic batch size below even
/// though both default to 3.
const DEFAULT_PAGE_SIZE: u32 = 3;
const DEFAULT_UNLOCK_BATCH_SIZE: usize = 3;
const DEFAULT_MAX_TRACKS: usize = 40;
const DEFAULT_INITIAL_VISIBLE: usize = 3;

const BATCH_UNLOCK_COST: u32 = 3;
const BATCH_LISTEN_REWARD: u32 = 1;
const PER_TRACK_UNLOCK_COST: u32 = 20;
const PER_TRACK_LISTEN_REWARD: u32 = 20;

const PLACEHOLDER_API_KEY: &str = "PASTE_YOUR_RESTRICTED_API_KEY_HERE";

/// The two unlock economies. Batch: reaching a scaling point threshold
/// fetches the next page without spending. PerTrack: each unlock spends a
/// fixed cost and reveals exactly one more track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnlockPolicy {
    Batch,
    PerTrack,
}

impl UnlockPolicy {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Batch => "BATCH",
            Self::PerTrack => "PER-TRACK",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QuestConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) policy: UnlockPolicy,
    pub(crate) unlock_cost: u32,
    pub(crate) listen_reward: u32,
    pub(crate) page_size: u32,
    pub(crate) unlock_batch_size: usize,
    pub(crate) max_tracks: usize,
    pub(crate) initial_visible: usize,
}

impl QuestConfig {
    pub(crate) fn from_env() -> Self {
        let policy = policy_from_env_value(env::var_os("LUDIO_UNLOCK_POLICY"));
        let mut config = Self::for_policy(policy);
        config.api_key = api_key_from_env_value(env::var_os("LUDIO_API_KEY"));
        if let Some(cost) = parse_override(env::var_os("LUDIO_UNLOCK_COST")) {
            config.unlock_cost = cost;
        }
        if let Some(reward) = parse_override(env::var_os("LUDIO_LISTEN_REWARD")) {
            config.listen_reward = reward;
        }
        config
    }

    /// Policy presets matching the two observed economies.
    pub(crate) fn for_policy(policy: UnlockPolicy) -> Self {
        let (unlock_cost, listen_reward) = match policy {
            UnlockPolicy::Batch => (BATCH_UNLOCK_COST, BATCH_LISTEN_REWARD),
            UnlockPolicy::PerTrack => (PER_TRACK_UNLOCK_COST, PER_TRACK_LISTEN_REWARD),
        };
        Self {
            api_key: None,
            policy,
            unlock_cost,
            listen_reward,
            page_size: DEFAULT_PAGE_SIZE,
            unlock_batch_size: DEFAULT_UNLOCK_BATCH_SIZE,
            max_tracks: DEFAULT_MAX_TRACKS,
            initial_visible: DEFAULT_INITIAL_VISIBLE,
        }
    }
}

pub(crate) fn policy_from_env_value(env_value: Option<OsString>) -> UnlockPolicy {
    let Some(raw) = env_value.and_then(|value| value.into_string().ok()) else {
        return UnlockPolicy::Batch;
    };
    match raw.trim().to_lowercase().as_str() {
        "per-track" | "per_track" | "pertrack" => UnlockPolicy::PerTrack,
        _ => UnlockPolicy::Batch,
    }
}

/// A missing, blank, or still-placeholder key counts as unconfigured; the
/// engine refuses to fetch rather than sending a doomed request.
pub(crate) fn api_key_from_env_value(env_value: Option<OsString>) -> Option<String> {
    let raw = env_value?.into_string().ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER_API_KEY {
        return None;
    }
    Some(trimmed.to_string())
}

fn parse_override(env_value: Option<OsString>) -> Option<u32> {
    let raw = env_value?.into_string().ok()?;
    raw.trim().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parsing_defaults_to_batch() {
        assert_eq!(policy_from_env_value(None), UnlockPolicy::Batch);
        assert_eq!(
            policy_from_env_value(Some(OsString::from("nonsense"))),
            UnlockPolicy::Batch
        );
        assert_eq!(
            policy_from_env_value(Some(OsString::from("per-track"))),
            UnlockPolicy::PerTrack
        );
        assert_eq!(
            policy_from_env_value(Some(OsString::from("  PER_TRACK "))),
            UnlockPolicy::PerTrack
        );
    }

    #[test]
    fn placeholder_or_blank_api_key_is_unconfigured() {
        assert_eq!(api_key_from_env_value(None), None);
        assert_eq!(api_key_from_env_value(Some(OsString::from("  "))), None);
        assert_eq!(
            api_key_from_env_value(Some(OsString::from(PLACEHOLDER_API_KEY))),
            None
        );
        assert_eq!(
            api_key_from_env_value(Some(OsString::from(" AIzaReal "))),
            Some("AIzaReal".to_string())
        );
    }

    #[test]
    fn policy_presets_match_observed_economies() {
        let batch = QuestConfig::for_policy(UnlockPolicy::Batch);
        assert_eq!(batch.unlock_cost, 3);
        assert_eq!(batch.listen_reward, 1);

        let per_track = QuestConfig::for_policy(UnlockPolicy::PerTrack);
        assert_eq!(per_track.unlock_cost, 20);
        assert_eq!(per_track.listen_reward, 20);
    }
}
