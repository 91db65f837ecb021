//! Reelplay Core - Episode playback library
//!
//! This crate provides the playback core of a multi-episode video client:
//! - Episode resolution from the backend's `name$url#name$url` field
//! - A playback state machine driven over an external media engine
//! - Reachability checks before network playback
//! - Fire-and-forget play-count recording
//! - Position persistence across suspension
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Reelplay Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Video     │  │   Episode    │  │ Reachability │           │
//! │  │  Repository  │  │   Resolver   │  │    Probe     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Player    │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    State     │  │   Player    │  │    Media     │            │
//! │  │    Store     │  │   Handle    │  │    Engine    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod episode;
pub mod error;
pub mod reachability;
pub mod repository;
pub mod session;
pub mod store;
pub mod types;

pub use config::{PlayerConfig, ReachabilityPolicy};
pub use engine::{event_channel, EngineEvent, EngineHandle, MediaEngine};
pub use episode::{resolve_episodes, EpisodeList};
pub use error::{Error, Result};
pub use reachability::{AlwaysReachable, HttpProbe, Reachability};
pub use repository::{HttpRepository, VideoRepository};
pub use session::{Collaborators, PlaybackSession, PlayerHandle, PlayerSession};
pub use store::{JsonFileStore, MemoryStore, SessionSnapshot, StateStore};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Reelplay Core initialized");
}
