//! Headless playback on a scripted engine
//!
//! The scripted engine "plays" every episode instantly: each load is
//! followed by buffering, ready, playing and end-of-stream notifications,
//! or by a not-found error for the episode chosen to fail.

use async_trait::async_trait;
use console::style;
use reelplay_core::engine::EngineEventSender;
use reelplay_core::{
    event_channel, AlwaysReachable, Collaborators, EngineErrorCode, EngineEvent, JsonFileStore,
    MediaEngine, MemoryStore, PlaybackState, PlayerConfig, PlayerSession, PlayerSnapshot,
    SessionId, StateStore, Video, VideoRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct ScriptedEngine {
    events: EngineEventSender,
    loads: usize,
    fail_load: Option<usize>,
    position: u64,
}

impl MediaEngine for ScriptedEngine {
    fn load_and_prepare(&mut self, url: &str) {
        self.loads += 1;
        self.position = 0;
        println!("  {} {}", style("load").cyan(), url);

        let script: &[EngineEvent] = if Some(self.loads) == self.fail_load {
            &[EngineEvent::Buffering, EngineEvent::Error(EngineErrorCode::IO_FILE_NOT_FOUND)]
        } else {
            &[
                EngineEvent::Buffering,
                EngineEvent::Ready,
                EngineEvent::IsPlayingChanged(true),
                EngineEvent::IsPlayingChanged(false),
                EngineEvent::Ended,
            ]
        };
        for event in script {
            let _ = self.events.send(*event);
        }
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.position = position_ms;
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn set_speed(&mut self, multiplier: f32) {
        info!(multiplier, "Scripted engine speed");
    }

    fn current_position(&self) -> u64 {
        self.position
    }

    fn release(&mut self) {
        println!("  {}", style("engine released").dim());
    }
}

/// Catalogue stand-in that only logs play recordings
struct OfflineRepository {
    video: Video,
}

#[async_trait]
impl VideoRepository for OfflineRepository {
    async fn fetch_video(&self, _id: i64) -> reelplay_core::Result<Video> {
        Ok(self.video.clone())
    }

    async fn fetch_videos_by_category(
        &self,
        _category: &str,
        _limit: u32,
        _offset: u32,
    ) -> reelplay_core::Result<Vec<Video>> {
        Ok(vec![self.video.clone()])
    }

    async fn increment_play_count(&self, id: i64) -> reelplay_core::Result<()> {
        println!("  {} video {}", style("play recorded").green(), id);
        Ok(())
    }
}

/// Whether the session has nothing more to play
fn is_finished(snapshot: &PlayerSnapshot, auto_advance: bool) -> bool {
    match snapshot.state {
        PlaybackState::Error(_) => true,
        // Without auto-advance every Ended is final
        PlaybackState::Ended => {
            !auto_advance || snapshot.current_index + 1 >= snapshot.episodes.len()
        }
        _ => false,
    }
}

/// Run every episode of `field` through a session and report the outcome
pub async fn run(config: PlayerConfig, field: &str, fail_episode: Option<usize>) -> anyhow::Result<()> {
    let video = Video {
        video_id: 0,
        video_title: "simulation".to_string(),
        video_category: None,
        video_url: field.to_string(),
        video_image: None,
        video_duration: None,
        play_count: None,
        video_coins: None,
        video_description: None,
    };

    let store: Arc<dyn StateStore> = match config.state_dir {
        Some(ref dir) => Arc::new(JsonFileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };
    let (events, events_rx) = event_channel();
    let engine = ScriptedEngine {
        events,
        loads: 0,
        fail_load: fail_episode,
        position: 0,
    };
    let collaborators = Collaborators {
        repository: Arc::new(OfflineRepository {
            video: video.clone(),
        }),
        reachability: Arc::new(AlwaysReachable),
        store,
    };

    let auto_advance = config.auto_advance;
    let handle =
        PlayerSession::spawn(SessionId::new(), config, engine, events_rx, collaborators).await;
    let mut rx = handle.subscribe();
    handle.load_video(video.video_id).await?;

    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s| is_finished(s, auto_advance)),
    )
    .await;

    let snapshot = match finished {
        Ok(Ok(snapshot)) => snapshot.clone(),
        Ok(Err(_)) => anyhow::bail!("session closed unexpectedly"),
        Err(_) => anyhow::bail!("simulation did not finish"),
    };

    println!();
    println!("Episodes: {}", snapshot.episodes.len());
    match snapshot.state {
        PlaybackState::Error(fault) => println!(
            "Stopped at episode {}: {} ({})",
            snapshot.current_index + 1,
            style(fault).red(),
            fault.code()
        ),
        state => println!("Final state: {}", style(state).green()),
    }

    handle.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelplay_core::{Episode, PlaybackFault};

    fn snapshot(state: PlaybackState, current_index: usize) -> PlayerSnapshot {
        PlayerSnapshot {
            episodes: vec![Episode::new("a", "/a"), Episode::new("b", "/b")],
            current_index,
            state,
            ..Default::default()
        }
    }

    #[test]
    fn test_ended_is_final_on_last_episode() {
        assert!(!is_finished(&snapshot(PlaybackState::Ended, 0), true));
        assert!(is_finished(&snapshot(PlaybackState::Ended, 1), true));
    }

    #[test]
    fn test_ended_is_final_without_auto_advance() {
        assert!(is_finished(&snapshot(PlaybackState::Ended, 0), false));
        assert!(!is_finished(&snapshot(PlaybackState::Ready, 0), false));
    }

    #[test]
    fn test_error_is_final() {
        let failed = PlaybackState::Error(PlaybackFault::EpisodeNotFound);
        assert!(is_finished(&snapshot(failed, 0), true));
        assert!(!is_finished(&snapshot(PlaybackState::Loading, 1), true));
    }
}
