//! Episode resolution from the backend's delimited URL field
//!
//! The field packs every episode of a video into one string:
//!
//! ```text
//! name$url#name$url#...
//! ```
//!
//! Episodes are separated by `#`; name and URL are separated by the first
//! `$`. The data is free text and frequently malformed, so resolution is
//! permissive: bad segments are skipped and the function never fails.

use crate::types::Episode;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EPISODE_SEPARATOR: char = '#';
const NAME_SEPARATOR: char = '$';

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Auto-generated label for the episode at a 1-based position
pub fn numbered_label(position: usize) -> String {
    format!("第{}集", position)
}

/// Parse a raw episode field into an ordered episode list
pub fn resolve_episodes(raw: &str) -> Vec<Episode> {
    if raw.is_empty() {
        return Vec::new();
    }

    let episodes = if raw.contains(EPISODE_SEPARATOR) {
        resolve_multi(raw)
    } else {
        resolve_single(raw).into_iter().collect()
    };

    debug!(count = episodes.len(), "Episodes resolved");
    episodes
}

fn resolve_single(raw: &str) -> Option<Episode> {
    let Some((left, right)) = raw.split_once(NAME_SEPARATOR) else {
        return Some(Episode::new("", raw));
    };

    if !is_blank(right) {
        Some(Episode::new(left, right))
    } else if !is_blank(left) {
        // Trailing stray delimiter: the left side is the URL
        Some(Episode::new("", left))
    } else {
        None
    }
}

fn resolve_multi(raw: &str) -> Vec<Episode> {
    raw.split(EPISODE_SEPARATOR)
        .enumerate()
        .filter(|(_, segment)| !is_blank(segment))
        .filter_map(|(i, segment)| resolve_segment(i + 1, segment))
        .collect()
}

fn resolve_segment(position: usize, segment: &str) -> Option<Episode> {
    match segment.split_once(NAME_SEPARATOR) {
        None => Some(Episode::new(numbered_label(position), segment)),
        Some((left, right)) if !is_blank(right) => Some(Episode::new(left, right)),
        Some((left, _)) if !is_blank(left) => Some(Episode::new(numbered_label(position), left)),
        Some(_) => None,
    }
}

/// Resolved episodes of one video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeList {
    episodes: Vec<Episode>,
}

impl EpisodeList {
    pub fn resolve(raw: &str) -> Self {
        Self {
            episodes: resolve_episodes(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Episode> {
        self.episodes.get(index)
    }

    /// Index following `index`, if there is one
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let next = index.checked_add(1)?;
        (next < self.episodes.len()).then_some(next)
    }

    /// Display label, falling back to the numbered label for unnamed episodes
    pub fn label(&self, index: usize) -> Option<String> {
        self.episodes.get(index).map(|e| {
            if is_blank(&e.name) {
                numbered_label(index + 1)
            } else {
                e.name.clone()
            }
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Episode> {
        self.episodes.iter()
    }

    pub fn as_slice(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn into_vec(self) -> Vec<Episode> {
        self.episodes
    }
}

impl From<Vec<Episode>> for EpisodeList {
    fn from(episodes: Vec<Episode>) -> Self {
        Self { episodes }
    }
}
