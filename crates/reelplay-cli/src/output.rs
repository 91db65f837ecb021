//! Output formatting for CLI

use reelplay_core::{EpisodeList, Video};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON for `--format json`
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Tabled)]
struct EpisodeRow {
    #[tabled(rename = "#")]
    number: usize,
    name: String,
    url: String,
}

#[derive(Tabled)]
struct VideoRow {
    id: i64,
    title: String,
    category: String,
    plays: String,
    duration: String,
}

/// Render an episode list in the requested format
pub fn episodes(list: &EpisodeList, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&list.as_slice()),
        OutputFormat::Table => {
            let rows: Vec<EpisodeRow> = list
                .iter()
                .enumerate()
                .map(|(i, e)| EpisodeRow {
                    number: i + 1,
                    name: list.label(i).unwrap_or_default(),
                    url: e.url.clone(),
                })
                .collect();
            Table::new(rows).to_string()
        }
        OutputFormat::Text => list
            .iter()
            .enumerate()
            .map(|(i, e)| format!("  {}. {} - {}", i + 1, list.label(i).unwrap_or_default(), e.url))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render a page of videos in the requested format
pub fn videos(videos: &[Video], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&videos),
        OutputFormat::Table => {
            let rows: Vec<VideoRow> = videos
                .iter()
                .map(|v| VideoRow {
                    id: v.video_id,
                    title: v.video_title.clone(),
                    category: v.video_category.clone().unwrap_or_default(),
                    plays: v.play_count_label().unwrap_or_default(),
                    duration: v.video_duration.clone().unwrap_or_default(),
                })
                .collect();
            Table::new(rows).to_string()
        }
        OutputFormat::Text => videos
            .iter()
            .map(|v| {
                let mut line = format!("  [{}] {}", v.video_id, v.video_title);
                if let Some(plays) = v.play_count_label() {
                    line.push_str(&format!(" ({})", plays));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_episode_text_uses_labels() {
        let list = EpisodeList::resolve("$/a#B$/b");
        assert_eq!(episodes(&list, OutputFormat::Text), "  1. 第1集 - /a\n  2. B - /b");
    }

    #[test]
    fn test_episode_json() {
        let list = EpisodeList::resolve("A$u1");
        let json: serde_json::Value =
            serde_json::from_str(&episodes(&list, OutputFormat::Json)).unwrap();
        assert_eq!(json[0]["name"], "A");
        assert_eq!(json[0]["url"], "u1");
    }
}
