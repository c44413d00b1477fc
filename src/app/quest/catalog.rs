use std::time::Duration;

use serde_json::Value;

use crate::http::{self, HttpFailure};

use super::{FetchError, Track};

const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const PLACEHOLDER_THUMBNAIL: &str = "https://placehold.co/48x48/1e293b/a8a29e?text=No+Art";
const LIVE_DURATION_LABEL: &str = "LIVE";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CatalogPage {
    pub(crate) tracks: Vec<Track>,
    pub(crate) next_page_token: Option<String>,
}

/// Fetch one page of playlist items. A single attempt: any failure is
/// returned to the caller, which treats it as fatal to the quest being
/// established.
pub(crate) fn fetch_page(
    api_key: &str,
    playlist_id: &str,
    page_token: Option<&str>,
    page_size: u32,
) -> Result<CatalogPage, FetchError> {
    let mut query = vec![
        ("part".to_string(), "snippet,contentDetails".to_string()),
        ("maxResults".to_string(), page_size.to_string()),
        ("playlistId".to_string(), playlist_id.to_string()),
        ("key".to_string(), api_key.to_string()),
    ];
    if let Some(token) = page_token {
        query.push(("pageToken".to_string(), token.to_string()));
    }

    match http::get_text(PLAYLIST_ITEMS_URL, &query, CONNECT_TIMEOUT, READ_TIMEOUT) {
        Ok(raw) => decode_catalog_page(&raw),
        Err(HttpFailure::Status { status, body }) => {
            // The API reports failures as an error payload on non-2xx
            // responses; prefer its message over the bare status code.
            Err(match upstream_error_in_body(&body) {
                Some(message) => FetchError::Upstream(message),
                None => FetchError::Upstream(format!("HTTP status {status}")),
            })
        }
        Err(HttpFailure::Transport(detail)) => Err(FetchError::Network(detail)),
    }
}

pub(crate) fn decode_catalog_page(raw: &str) -> Result<CatalogPage, FetchError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| FetchError::Upstream(format!("undecodable response: {err}")))?;

    if let Some(message) = upstream_error_message(&parsed) {
        return Err(FetchError::Upstream(message));
    }

    let Some(items) = parsed.get("items").and_then(Value::as_array) else {
        return Err(FetchError::Upstream(
            "response carries no items array".to_string(),
        ));
    };

    let tracks = items.iter().filter_map(decode_track_item).collect();
    let next_page_token = parsed
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CatalogPage {
        tracks,
        next_page_token,
    })
}

fn upstream_error_message(parsed: &Value) -> Option<String> {
    parsed
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn upstream_error_in_body(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    upstream_error_message(&parsed)
}

fn decode_track_item(item: &Value) -> Option<Track> {
    let id = item.get("id")?.as_str()?.trim();
    let video_id = item.pointer("/contentDetails/videoId")?.as_str()?.trim();
    let title = item.pointer("/snippet/title")?.as_str()?.trim();
    if id.is_empty() || video_id.is_empty() {
        return None;
    }

    let channel_title = item
        .pointer("/snippet/channelTitle")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    let thumbnail_url = item
        .pointer("/snippet/thumbnails/default/url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(PLACEHOLDER_THUMBNAIL)
        .to_string();
    let duration = item
        .pointer("/contentDetails/duration")
        .and_then(Value::as_str)
        .map(format_iso8601_duration)
        .unwrap_or_else(|| LIVE_DURATION_LABEL.to_string());

    Some(Track {
        id: id.to_string(),
        video_id: video_id.to_string(),
        title: title.to_string(),
        channel_title,
        thumbnail_url,
        duration,
    })
}

/// Render an upstream ISO-8601 duration code as `H:MM:SS` or `M:SS`. Live
/// and unknown durations (no `PT` component, zero length, or anything
/// unparsable) get the LIVE sentinel.
pub(crate) fn format_iso8601_duration(code: &str) -> String {
    match parse_iso8601_seconds(code) {
        Some(total) if total > 0 => {
            let hours = total / 3600;
            let minutes = (total % 3600) / 60;
            let seconds = total % 60;
            if hours > 0 {
                format!("{hours}:{minutes:02}:{seconds:02}")
            } else {
                format!("{minutes}:{seconds:02}")
            }
        }
        _ => LIVE_DURATION_LABEL.to_string(),
    }
}

fn parse_iso8601_seconds(code: &str) -> Option<u64> {
    let rest = code.trim().strip_prefix("PT")?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        total += match ch {
            'H' => value * 3600,
            'M' => value * 60,
            'S' => value,
            _ => return None,
        };
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}
