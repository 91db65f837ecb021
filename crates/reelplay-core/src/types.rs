//! Core types for Reelplay

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one player screen instance; also the persistence key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalogue entry as returned by the backend API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub video_id: i64,
    pub video_title: String,
    #[serde(default)]
    pub video_category: Option<String>,
    /// Raw episode field, see [`crate::episode`]
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub video_image: Option<String>,
    #[serde(default)]
    pub video_duration: Option<String>,
    #[serde(default)]
    pub play_count: Option<u64>,
    #[serde(default)]
    pub video_coins: Option<u32>,
    #[serde(default)]
    pub video_description: Option<String>,
}

impl Video {
    /// Play count label for list rows, `None` when there is nothing to show
    pub fn play_count_label(&self) -> Option<String> {
        self.play_count.filter(|&c| c > 0).map(format_play_count)
    }
}

/// Render a play count the way the catalogue grid shows it
pub fn format_play_count(count: u64) -> String {
    if count >= 10_000 {
        format!("{:.1}万次播放", count as f64 / 10_000.0)
    } else {
        format!("{}次播放", count)
    }
}

/// One playable unit of a video
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    pub url: String,
}

impl Episode {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Native error code reported by the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineErrorCode(pub i32);

impl EngineErrorCode {
    pub const UNSPECIFIED: Self = Self(1000);
    pub const REMOTE_ERROR: Self = Self(1001);
    pub const BEHIND_LIVE_WINDOW: Self = Self(1002);
    pub const TIMEOUT: Self = Self(1003);
    pub const IO_UNSPECIFIED: Self = Self(2000);
    pub const IO_NETWORK_CONNECTION_FAILED: Self = Self(2001);
    pub const IO_NETWORK_CONNECTION_TIMEOUT: Self = Self(2002);
    pub const IO_INVALID_HTTP_CONTENT_TYPE: Self = Self(2003);
    pub const IO_BAD_HTTP_STATUS: Self = Self(2004);
    pub const IO_FILE_NOT_FOUND: Self = Self(2005);
    pub const IO_CLEARTEXT_NOT_PERMITTED: Self = Self(2007);
    pub const PARSING_CONTAINER_MALFORMED: Self = Self(3001);
    pub const PARSING_MANIFEST_MALFORMED: Self = Self(3002);
    pub const PARSING_CONTAINER_UNSUPPORTED: Self = Self(3003);
    pub const PARSING_MANIFEST_UNSUPPORTED: Self = Self(3004);
    pub const DECODER_INIT_FAILED: Self = Self(4001);
    pub const DECODING_FAILED: Self = Self(4002);
    pub const DECODING_FORMAT_EXCEEDS_CAPABILITIES: Self = Self(4003);
    pub const DECODING_FORMAT_UNSUPPORTED: Self = Self(4005);
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-facing category of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFault {
    Network,
    NotFound,
    UnsupportedFormat,
    Generic,
}

impl EngineFault {
    /// Map a native engine error code onto a fault category
    pub fn from_code(code: EngineErrorCode) -> Self {
        match code {
            EngineErrorCode::TIMEOUT
            | EngineErrorCode::IO_NETWORK_CONNECTION_FAILED
            | EngineErrorCode::IO_NETWORK_CONNECTION_TIMEOUT
            | EngineErrorCode::IO_CLEARTEXT_NOT_PERMITTED => EngineFault::Network,
            EngineErrorCode::IO_BAD_HTTP_STATUS | EngineErrorCode::IO_FILE_NOT_FOUND => {
                EngineFault::NotFound
            }
            EngineErrorCode::IO_INVALID_HTTP_CONTENT_TYPE
            | EngineErrorCode::PARSING_CONTAINER_MALFORMED
            | EngineErrorCode::PARSING_MANIFEST_MALFORMED
            | EngineErrorCode::PARSING_CONTAINER_UNSUPPORTED
            | EngineErrorCode::PARSING_MANIFEST_UNSUPPORTED
            | EngineErrorCode::DECODING_FORMAT_EXCEEDS_CAPABILITIES
            | EngineErrorCode::DECODING_FORMAT_UNSUPPORTED => EngineFault::UnsupportedFormat,
            _ => EngineFault::Generic,
        }
    }
}

/// Faults that block playback and are shown to the user with a retry action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fault", rename_all = "snake_case")]
pub enum PlaybackFault {
    NoEpisodes,
    EpisodeNotFound,
    InvalidUrl,
    NetworkUnavailable,
    VideoUnavailable,
    Engine(EngineFault),
}

impl PlaybackFault {
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackFault::NoEpisodes => "NO_EPISODES",
            PlaybackFault::EpisodeNotFound => "EPISODE_NOT_FOUND",
            PlaybackFault::InvalidUrl => "INVALID_URL",
            PlaybackFault::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            PlaybackFault::VideoUnavailable => "VIDEO_UNAVAILABLE",
            PlaybackFault::Engine(EngineFault::Network) => "ENGINE_NETWORK",
            PlaybackFault::Engine(EngineFault::NotFound) => "ENGINE_NOT_FOUND",
            PlaybackFault::Engine(EngineFault::UnsupportedFormat) => "ENGINE_FORMAT",
            PlaybackFault::Engine(EngineFault::Generic) => "ENGINE_GENERIC",
        }
    }
}

impl std::fmt::Display for PlaybackFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            PlaybackFault::NoEpisodes => "No episodes available",
            PlaybackFault::EpisodeNotFound => "Episode not found",
            PlaybackFault::InvalidUrl => "Invalid video URL",
            PlaybackFault::NetworkUnavailable => "Network unavailable, check your connection",
            PlaybackFault::VideoUnavailable => "Failed to load video",
            PlaybackFault::Engine(EngineFault::Network) => "Network error during playback",
            PlaybackFault::Engine(EngineFault::NotFound) => "Video source not found",
            PlaybackFault::Engine(EngineFault::UnsupportedFormat) => "Unsupported video format",
            PlaybackFault::Engine(EngineFault::Generic) => "Playback failed",
        };
        f.write_str(message)
    }
}

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "fault", rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing selected yet
    Idle,
    /// Episode selected, waiting for the engine
    Loading,
    /// Engine prepared and buffered
    Ready,
    /// Playback blocked until retry or a new selection
    Error(PlaybackFault),
    /// End of stream with no episode to advance to
    Ended,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // Selection re-enters Loading from anywhere
            (_, Loading) |
            // Engine faults can arrive at any time
            (_, Error(_)) |
            (Loading, Ready) |
            (Ready, Ended)
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Error(fault) => write!(f, "error({})", fault.code()),
            PlaybackState::Ended => write!(f, "ended"),
        }
    }
}

/// Plain state container published to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub video: Option<Video>,
    pub episodes: Vec<Episode>,
    pub current_index: usize,
    pub state: PlaybackState,
    pub is_playing: bool,
    pub buffering: bool,
    pub speed: f32,
    pub error_message: Option<String>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            video: None,
            episodes: Vec::new(),
            current_index: 0,
            state: PlaybackState::Idle,
            is_playing: false,
            buffering: false,
            speed: 1.0,
            error_message: None,
        }
    }
}

impl PlayerSnapshot {
    pub fn current_episode(&self) -> Option<&Episode> {
        self.episodes.get(self.current_index)
    }
}
