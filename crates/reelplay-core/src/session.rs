//! Player Session - episode playback orchestrator
//!
//! Coordinates:
//! - Video fetching and episode resolution
//! - The playback state machine over an external [`MediaEngine`]
//! - Reachability checks before network playback
//! - Play-count recording
//! - Position persistence across suspension
//!
//! Each session is owned by one tokio task. UI commands arrive through a
//! [`PlayerHandle`], engine notifications through an [`EngineEventReceiver`],
//! and background work reports back on an internal channel. Background
//! results carry the load generation they were started for and are dropped
//! when it no longer matches.

use crate::{
    config::{PlayerConfig, ReachabilityPolicy, MAX_SPEED, MIN_SPEED},
    engine::{EngineEvent, EngineEventReceiver, EngineHandle, MediaEngine},
    episode::resolve_episodes,
    reachability::{is_network_url, Reachability},
    repository::VideoRepository,
    store::{SessionSnapshot, StateStore},
    types::*,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

/// Episode list and per-episode playback scalars
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    episodes: Vec<Episode>,
    current_index: usize,
    position_ms: u64,
    play_when_ready: bool,
    play_recorded: bool,
}

impl PlaybackSession {
    /// Build a session; an out-of-range index falls back to the first
    /// episode with position 0
    pub fn new(episodes: Vec<Episode>, index: usize, position_ms: u64, play_when_ready: bool) -> Self {
        let (current_index, position_ms) = if index < episodes.len() {
            (index, position_ms)
        } else {
            (0, 0)
        };
        Self {
            episodes,
            current_index,
            position_ms,
            play_when_ready,
            play_recorded: false,
        }
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.episodes.get(self.current_index)
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    pub fn play_recorded(&self) -> bool {
        self.play_recorded
    }

    pub fn next_index(&self) -> Option<usize> {
        let next = self.current_index + 1;
        (next < self.episodes.len()).then_some(next)
    }

    /// Move to another episode. Position and play flag reset only when the
    /// index actually changes; out-of-range indices are refused.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.episodes.len() {
            return false;
        }
        if index != self.current_index {
            self.current_index = index;
            self.position_ms = 0;
            self.play_recorded = false;
        }
        true
    }

    fn set_position(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.play_when_ready = play_when_ready;
    }

    /// Returns true the first time it is called for the current episode
    fn mark_play_recorded(&mut self) -> bool {
        !std::mem::replace(&mut self.play_recorded, true)
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(Vec::new(), 0, 0, true)
    }
}

/// External collaborators of a session
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn VideoRepository>,
    pub reachability: Arc<dyn Reachability>,
    pub store: Arc<dyn StateStore>,
}

enum Command {
    LoadVideo(i64),
    ShowVideo(Box<Video>),
    SelectEpisode(usize),
    SetSpeed(f32, oneshot::Sender<Result<()>>),
    Play,
    Pause,
    Retry,
    Suspend(oneshot::Sender<Result<()>>),
    Resume(oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<Result<()>>),
}

enum Internal {
    VideoFetched { request: u64, result: Result<Video> },
    Reachability { generation: u64, result: Result<bool> },
    PlayRecorded { video_id: i64, result: Result<()> },
}

/// Player session managing playback of one video's episodes
pub struct PlayerSession<E: MediaEngine> {
    /// Screen instance / persistence key
    id: SessionId,
    config: PlayerConfig,
    engine: EngineHandle<E>,
    repository: Arc<dyn VideoRepository>,
    reachability: Arc<dyn Reachability>,
    store: Arc<dyn StateStore>,
    /// Snapshot read back on creation, consumed by the first video
    restored: Option<SessionSnapshot>,
    video: Option<Video>,
    /// Video requested by the last `load_video`, kept for retry
    requested_video: Option<i64>,
    fetch_request: u64,
    playback: PlaybackSession,
    state: PlaybackState,
    is_playing: bool,
    buffering: bool,
    speed: f32,
    /// Bumped on every episode load
    generation: u64,
    /// Generation the engine was last handed a URL for
    engine_generation: Option<u64>,
    /// Seek target applied on the next `Ready`
    pending_seek: Option<u64>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: Option<mpsc::UnboundedReceiver<Internal>>,
    state_tx: watch::Sender<PlayerSnapshot>,
}

impl<E: MediaEngine> PlayerSession<E> {
    /// Create a session; `restored` is the snapshot saved for `id`, if any
    pub(crate) fn new(
        id: SessionId,
        config: PlayerConfig,
        engine: E,
        collaborators: Collaborators,
        restored: Option<SessionSnapshot>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let speed = config.default_speed;
        let (state_tx, _) = watch::channel(PlayerSnapshot {
            speed,
            ..Default::default()
        });

        Self {
            id,
            config,
            engine: EngineHandle::new(engine),
            repository: collaborators.repository,
            reachability: collaborators.reachability,
            store: collaborators.store,
            restored,
            video: None,
            requested_video: None,
            fetch_request: 0,
            playback: PlaybackSession::default(),
            state: PlaybackState::Idle,
            is_playing: false,
            buffering: false,
            speed,
            generation: 0,
            engine_generation: None,
            pending_seek: None,
            internal_tx,
            internal_rx: Some(internal_rx),
            state_tx,
        }
    }

    /// Restore any saved snapshot for `id`, then run the session on its own task
    pub async fn spawn(
        id: SessionId,
        config: PlayerConfig,
        engine: E,
        events: EngineEventReceiver,
        collaborators: Collaborators,
    ) -> PlayerHandle {
        let restored = match collaborators.store.load(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to restore session snapshot");
                None
            }
        };
        if let Some(ref snapshot) = restored {
            info!(
                session_id = %id,
                episode = snapshot.episode_index,
                position_ms = snapshot.position_ms,
                "Session snapshot restored"
            );
        }

        let session = Self::new(id, config, engine, collaborators, restored);
        let state_rx = session.state_tx.subscribe();
        let (command_tx, command_rx) = mpsc::channel(32);

        tokio::spawn(session.run(command_rx, events));

        PlayerHandle {
            id,
            commands: command_tx,
            state_rx,
        }
    }

    /// Drive the session until shutdown or until every handle is dropped
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: EngineEventReceiver) {
        let Some(mut internal) = self.internal_rx.take() else {
            return;
        };

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        let result = self.shutdown().await;
                        let _ = reply.send(result);
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        if let Err(e) = self.shutdown().await {
                            warn!(error = %e, "Shutdown after handle drop failed");
                        }
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_engine_event(event),
                Some(message) = internal.recv() => self.on_internal(message),
            }
        }

        debug!(session_id = %self.id, "Session task finished");
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playback(&self) -> &PlaybackSession {
        &self.playback
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state_tx.subscribe()
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::LoadVideo(id) => self.load_video(id),
            Command::ShowVideo(video) => self.show_video(*video),
            Command::SelectEpisode(index) => self.select_episode(index),
            Command::SetSpeed(speed, reply) => {
                let _ = reply.send(self.set_speed(speed));
            }
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Retry => self.retry(),
            Command::Suspend(reply) => {
                let _ = reply.send(self.suspend().await);
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.resume().await);
            }
            // Handled by the run loop
            Command::Shutdown(reply) => {
                let _ = reply.send(Err(Error::SessionClosed));
            }
        }
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::VideoFetched { request, result } => self.on_video_fetched(request, result),
            Internal::Reachability { generation, result } => self.on_reachability(generation, result),
            Internal::PlayRecorded { video_id, result } => match result {
                Ok(()) => debug!(video_id, "Play count recorded"),
                Err(e) => warn!(video_id, error = %e, "Play count increment failed"),
            },
        }
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    fn transition(&mut self, new_state: PlaybackState) -> Result<()> {
        let current = self.state;
        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        info!(from = %current, to = %new_state, "State transition");
        self.publish();
        Ok(())
    }

    /// Transition, logging and dropping a refused one
    fn enter(&mut self, new_state: PlaybackState) {
        if let Err(e) = self.transition(new_state) {
            warn!(error = %e, code = e.error_code(), "Ignoring state transition");
        }
    }

    fn fail(&mut self, fault: PlaybackFault) {
        warn!(code = fault.code(), message = %fault, "Playback blocked");
        self.halt_engine();
        self.is_playing = false;
        self.buffering = false;
        self.enter(PlaybackState::Error(fault));
    }

    /// Pause whatever the engine holds and stop listening to it
    fn halt_engine(&mut self) {
        if self.engine_generation.take().is_some() {
            self.engine.with(|engine| engine.pause());
        }
    }

    /// Whether engine notifications belong to the current load
    fn engine_is_current(&self) -> bool {
        self.engine_generation == Some(self.generation)
    }

    fn publish(&self) {
        self.state_tx.send_replace(PlayerSnapshot {
            video: self.video.clone(),
            episodes: self.playback.episodes().to_vec(),
            current_index: self.playback.current_index(),
            state: self.state,
            is_playing: self.is_playing,
            buffering: self.buffering,
            speed: self.speed,
            error_message: match self.state {
                PlaybackState::Error(fault) => Some(fault.to_string()),
                _ => None,
            },
        });
    }

    // =========================================================================
    // Video loading
    // =========================================================================

    /// Fetch a video in the background and play it once it arrives
    #[instrument(skip(self), fields(session_id = %self.id))]
    fn load_video(&mut self, id: i64) {
        info!("Loading video");

        self.requested_video = Some(id);
        self.fetch_request += 1;
        self.halt_engine();
        self.generation += 1;
        self.pending_seek = None;
        self.is_playing = false;
        self.buffering = false;
        self.enter(PlaybackState::Loading);

        let request = self.fetch_request;
        let repository = self.repository.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = repository.fetch_video(id).await;
            let _ = tx.send(Internal::VideoFetched { request, result });
        });
    }

    fn on_video_fetched(&mut self, request: u64, result: Result<Video>) {
        if request != self.fetch_request {
            debug!(request, "Ignoring stale video fetch");
            return;
        }

        match result {
            Ok(video) => self.show_video(video),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Video fetch failed");
                self.fail(PlaybackFault::VideoUnavailable);
            }
        }
    }

    /// Resolve a video's episodes and start the first (or restored) one
    fn show_video(&mut self, video: Video) {
        // A directly supplied video supersedes any fetch still in flight
        self.fetch_request += 1;

        let episodes = resolve_episodes(&video.video_url);
        info!(
            video_id = video.video_id,
            title = %video.video_title,
            episodes = episodes.len(),
            "Video loaded"
        );

        self.playback = match self.restored.take() {
            Some(snapshot) => PlaybackSession::new(
                episodes,
                snapshot.episode_index,
                snapshot.position_ms,
                snapshot.play_when_ready,
            ),
            None => PlaybackSession::new(episodes, 0, 0, true),
        };
        self.video = Some(video);
        self.begin_load();
    }

    // =========================================================================
    // Episode loading
    // =========================================================================

    /// Select an episode; re-selecting the current one is a no-op
    fn select_episode(&mut self, index: usize) {
        if index == self.playback.current_index() && self.state != PlaybackState::Idle {
            debug!(index, "Episode already selected");
            return;
        }

        if index >= self.playback.episodes().len() {
            // Keep the current index valid and report the bad selection
            self.halt_engine();
            self.generation += 1;
            self.enter(PlaybackState::Loading);
            let fault = if self.playback.episodes().is_empty() {
                PlaybackFault::NoEpisodes
            } else {
                PlaybackFault::EpisodeNotFound
            };
            self.fail(fault);
            return;
        }

        self.playback.select(index);
        self.playback.set_play_when_ready(true);
        self.begin_load();
    }

    fn begin_load(&mut self) {
        self.halt_engine();
        self.generation += 1;
        self.pending_seek = None;
        self.is_playing = false;
        self.buffering = false;
        self.enter(PlaybackState::Loading);

        if self.playback.episodes().is_empty() {
            self.fail(PlaybackFault::NoEpisodes);
            return;
        }
        let Some(episode) = self.playback.current_episode().cloned() else {
            self.fail(PlaybackFault::EpisodeNotFound);
            return;
        };
        if episode.url.trim().is_empty() {
            self.fail(PlaybackFault::InvalidUrl);
            return;
        }

        info!(
            index = self.playback.current_index(),
            name = %episode.name,
            url = %episode.url,
            "Loading episode"
        );

        if is_network_url(&episode.url) {
            let generation = self.generation;
            let reachability = self.reachability.clone();
            let tx = self.internal_tx.clone();
            tokio::spawn(async move {
                let result = reachability.is_reachable().await;
                let _ = tx.send(Internal::Reachability { generation, result });
            });
        } else {
            self.start_engine(&episode.url);
        }
    }

    fn on_reachability(&mut self, generation: u64, result: Result<bool>) {
        if generation != self.generation || self.state != PlaybackState::Loading {
            debug!(generation, "Ignoring stale reachability result");
            return;
        }

        let reachable = match result {
            Ok(reachable) => reachable,
            Err(e) => {
                let assume = self.config.reachability_policy == ReachabilityPolicy::AssumeAvailable;
                warn!(error = %e, assume_available = assume, "Reachability check failed");
                assume
            }
        };

        if !reachable {
            self.fail(PlaybackFault::NetworkUnavailable);
            return;
        }

        if let Some(url) = self.playback.current_episode().map(|e| e.url.clone()) {
            self.start_engine(&url);
        }
    }

    fn start_engine(&mut self, url: &str) {
        let position = self.playback.position_ms();
        self.pending_seek = (position > 0).then_some(position);

        let speed = self.speed;
        self.engine_generation = Some(self.generation);
        self.engine.with(|engine| {
            engine.load_and_prepare(url);
            engine.set_speed(speed);
        });
        debug!(url, resume_at_ms = position, "Engine preparing");
    }

    // =========================================================================
    // Engine notifications
    // =========================================================================

    fn on_engine_event(&mut self, event: EngineEvent) {
        debug!(?event, state = %self.state, "Engine event");

        if !self.engine_is_current() {
            debug!(?event, "Ignoring event from a superseded load");
            return;
        }

        match event {
            EngineEvent::Buffering => {
                self.buffering = true;
                self.publish();
            }
            EngineEvent::Ready => {
                self.buffering = false;
                if self.state != PlaybackState::Loading {
                    self.publish();
                    return;
                }
                if let Some(position) = self.pending_seek.take() {
                    self.engine.with(|engine| engine.seek_to(position));
                }
                let play = self.playback.play_when_ready();
                self.enter(PlaybackState::Ready);
                if play {
                    self.engine.with(|engine| engine.play());
                }
            }
            EngineEvent::Ended => {
                if self.state != PlaybackState::Ready {
                    return;
                }
                self.is_playing = false;
                self.enter(PlaybackState::Ended);

                if !self.config.auto_advance {
                    return;
                }
                if let Some(next) = self.playback.next_index() {
                    info!(next, "Advancing to next episode");
                    self.playback.select(next);
                    self.playback.set_play_when_ready(true);
                    self.begin_load();
                }
            }
            EngineEvent::IsPlayingChanged(playing) => {
                self.is_playing = playing;
                if playing && self.state == PlaybackState::Ready {
                    self.record_play_once();
                }
                self.publish();
            }
            EngineEvent::Error(code) => {
                let fault = EngineFault::from_code(code);
                warn!(%code, ?fault, "Engine reported an error");
                self.pending_seek = None;
                self.fail(PlaybackFault::Engine(fault));
            }
        }
    }

    fn record_play_once(&mut self) {
        let Some(video_id) = self.video.as_ref().map(|v| v.video_id) else {
            return;
        };
        if !self.playback.mark_play_recorded() {
            return;
        }

        debug!(video_id, episode = self.playback.current_index(), "Recording play");
        let repository = self.repository.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = repository.increment_play_count(video_id).await;
            let _ = tx.send(Internal::PlayRecorded { video_id, result });
        });
    }

    // =========================================================================
    // User commands
    // =========================================================================

    fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(Error::InvalidSpeed { speed });
        }
        self.speed = speed;
        self.engine.with(|engine| engine.set_speed(speed));
        info!(speed, "Playback speed changed");
        self.publish();
        Ok(())
    }

    fn play(&mut self) {
        self.playback.set_play_when_ready(true);
        if self.state == PlaybackState::Ready {
            self.engine.with(|engine| engine.play());
        }
    }

    fn pause(&mut self) {
        self.playback.set_play_when_ready(false);
        self.engine.with(|engine| engine.pause());
    }

    /// Re-run whatever step failed
    fn retry(&mut self) {
        match self.state {
            PlaybackState::Error(PlaybackFault::VideoUnavailable) => match self.requested_video {
                Some(id) => self.load_video(id),
                None => debug!("Nothing to retry"),
            },
            PlaybackState::Error(fault) => {
                info!(code = fault.code(), "Retrying episode");
                self.begin_load();
            }
            state => debug!(%state, "Retry ignored outside the error state"),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn capture_position(&mut self) {
        // Only trust the engine once it holds the current episode
        if matches!(self.state, PlaybackState::Ready | PlaybackState::Ended) {
            let position = self.engine.current_position();
            self.playback.set_position(position);
        }
    }

    fn current_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(
            self.playback.position_ms(),
            self.playback.play_when_ready(),
            self.playback.current_index(),
        )
    }

    /// Persist position, play flag and episode index, then pause the engine
    #[instrument(skip(self), fields(session_id = %self.id))]
    async fn suspend(&mut self) -> Result<()> {
        self.capture_position();
        let snapshot = self.current_snapshot();
        self.engine.with(|engine| engine.pause());
        self.store.save(self.id, &snapshot).await?;
        info!(
            position_ms = snapshot.position_ms,
            episode = snapshot.episode_index,
            "Session suspended"
        );
        Ok(())
    }

    /// Read the persisted scalars back and continue from them
    #[instrument(skip(self), fields(session_id = %self.id))]
    async fn resume(&mut self) -> Result<()> {
        let Some(snapshot) = self.store.load(self.id).await? else {
            debug!("No snapshot to resume from");
            return Ok(());
        };

        if snapshot.episode_index != self.playback.current_index() {
            if self.playback.select(snapshot.episode_index) {
                self.playback.set_position(snapshot.position_ms);
                self.playback.set_play_when_ready(snapshot.play_when_ready);
                self.begin_load();
            } else {
                warn!(episode = snapshot.episode_index, "Snapshot episode no longer exists");
            }
            return Ok(());
        }

        self.playback.set_position(snapshot.position_ms);
        self.playback.set_play_when_ready(snapshot.play_when_ready);

        match self.state {
            PlaybackState::Ready => {
                let play = snapshot.play_when_ready;
                self.engine.with(|engine| {
                    engine.seek_to(snapshot.position_ms);
                    if play {
                        engine.play();
                    }
                });
            }
            PlaybackState::Loading => {
                self.pending_seek = (snapshot.position_ms > 0).then_some(snapshot.position_ms);
            }
            _ => {}
        }

        info!(position_ms = snapshot.position_ms, "Session resumed");
        Ok(())
    }

    /// Persist state, abandon background work and release the engine
    #[instrument(skip(self), fields(session_id = %self.id))]
    async fn shutdown(&mut self) -> Result<()> {
        self.capture_position();
        let snapshot = self.current_snapshot();

        // In-flight results no longer match anything
        self.generation += 1;
        self.fetch_request += 1;
        self.engine.release();

        let result = self.store.save(self.id, &snapshot).await;
        if let Err(ref e) = result {
            warn!(error = %e, "Failed to persist session on shutdown");
        }
        info!("Session shut down");
        result
    }
}

/// UI-facing handle to a running [`PlayerSession`]
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<PlayerSnapshot>,
}

impl PlayerHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current published state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state_rx.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Fetch a video by ID and start playing it
    pub async fn load_video(&self, id: i64) -> Result<()> {
        self.send(Command::LoadVideo(id)).await
    }

    /// Play an already fetched video
    pub async fn show_video(&self, video: Video) -> Result<()> {
        self.send(Command::ShowVideo(Box::new(video))).await
    }

    pub async fn select_episode(&self, index: usize) -> Result<()> {
        self.send(Command::SelectEpisode(index)).await
    }

    pub async fn set_speed(&self, multiplier: f32) -> Result<()> {
        self.request(|reply| Command::SetSpeed(multiplier, reply)).await
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.send(Command::Retry).await
    }

    /// Persist position and pause; completes once the snapshot is stored
    pub async fn suspend(&self) -> Result<()> {
        self.request(Command::Suspend).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    /// Persist state and release the engine; the session stops afterwards
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String),
        Seek(u64),
        Play,
        Pause,
        Speed(f32),
        Release,
    }

    #[derive(Clone, Default)]
    struct RecordingEngine {
        calls: Arc<Mutex<Vec<Call>>>,
        position: Arc<Mutex<u64>>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn loads(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Load(url) => Some(url),
                    _ => None,
                })
                .collect()
        }

        fn set_position(&self, ms: u64) {
            *self.position.lock().unwrap() = ms;
        }
    }

    impl MediaEngine for RecordingEngine {
        fn load_and_prepare(&mut self, url: &str) {
            self.calls.lock().unwrap().push(Call::Load(url.to_string()));
        }
        fn seek_to(&mut self, position_ms: u64) {
            self.calls.lock().unwrap().push(Call::Seek(position_ms));
        }
        fn play(&mut self) {
            self.calls.lock().unwrap().push(Call::Play);
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }
        fn set_speed(&mut self, multiplier: f32) {
            self.calls.lock().unwrap().push(Call::Speed(multiplier));
        }
        fn current_position(&self) -> u64 {
            *self.position.lock().unwrap()
        }
        fn release(&mut self) {
            self.calls.lock().unwrap().push(Call::Release);
        }
    }

    #[derive(Default)]
    struct CountingRepository {
        plays: AtomicUsize,
    }

    #[async_trait]
    impl VideoRepository for CountingRepository {
        async fn fetch_video(&self, id: i64) -> Result<Video> {
            Err(Error::VideoNotFound { id })
        }
        async fn fetch_videos_by_category(&self, _: &str, _: u32, _: u32) -> Result<Vec<Video>> {
            Ok(Vec::new())
        }
        async fn increment_play_count(&self, _id: i64) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Err(Error::ApiStatus {
                url: "test".into(),
                status: 500,
            })
        }
    }

    struct FixedReachability(bool);

    #[async_trait]
    impl Reachability for FixedReachability {
        async fn is_reachable(&self) -> Result<bool> {
            Ok(self.0)
        }
    }

    struct Fixture {
        session: PlayerSession<RecordingEngine>,
        engine: RecordingEngine,
        repository: Arc<CountingRepository>,
    }

    fn fixture(reachable: bool, restored: Option<SessionSnapshot>) -> Fixture {
        let engine = RecordingEngine::default();
        let repository = Arc::new(CountingRepository::default());
        let collaborators = Collaborators {
            repository: repository.clone(),
            reachability: Arc::new(FixedReachability(reachable)),
            store: Arc::new(MemoryStore::new()),
        };
        let session = PlayerSession::new(
            SessionId::new(),
            PlayerConfig::default(),
            engine.clone(),
            collaborators,
            restored,
        );
        Fixture {
            session,
            engine,
            repository,
        }
    }

    fn video(url: &str) -> Video {
        Video {
            video_id: 9,
            video_title: "Series".into(),
            video_category: None,
            video_url: url.into(),
            video_image: None,
            video_duration: None,
            play_count: None,
            video_coins: None,
            video_description: None,
        }
    }

    /// Deliver the next background result to the session
    async fn pump(session: &mut PlayerSession<RecordingEngine>) {
        let message = session
            .internal_rx
            .as_mut()
            .unwrap()
            .recv()
            .await
            .unwrap();
        session.on_internal(message);
    }

    #[tokio::test]
    async fn test_local_episode_goes_straight_to_engine() {
        let mut f = fixture(true, None);
        f.session.show_video(video("A$/media/a.mp4#B$/media/b.mp4"));

        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.engine.loads(), vec!["/media/a.mp4".to_string()]);

        f.session.on_engine_event(EngineEvent::Ready);
        assert_eq!(f.session.state(), PlaybackState::Ready);
        assert_eq!(f.engine.calls().last(), Some(&Call::Play));
    }

    #[tokio::test]
    async fn test_network_episode_waits_for_reachability() {
        let mut f = fixture(true, None);
        f.session.show_video(video("http://cdn/a.m3u8"));
        assert!(f.engine.loads().is_empty());

        pump(&mut f.session).await;
        assert_eq!(f.engine.loads(), vec!["http://cdn/a.m3u8".to_string()]);
        assert_eq!(f.session.state(), PlaybackState::Loading);
    }

    #[tokio::test]
    async fn test_unreachable_network_never_reaches_engine() {
        let mut f = fixture(false, None);
        f.session.show_video(video("https://cdn/a.m3u8"));
        pump(&mut f.session).await;

        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::NetworkUnavailable)
        );
        assert!(f.engine.loads().is_empty());
    }

    #[tokio::test]
    async fn test_probe_failure_follows_policy() {
        let mut f = fixture(true, None);
        f.session.show_video(video("https://cdn/a.m3u8"));
        let generation = f.session.generation;
        f.session.on_reachability(generation, Err(Error::Io(std::io::Error::other("probe"))));
        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::NetworkUnavailable)
        );

        let mut f = fixture(true, None);
        f.session.config.reachability_policy = ReachabilityPolicy::AssumeAvailable;
        f.session.show_video(video("https://cdn/a.m3u8"));
        let generation = f.session.generation;
        f.session.on_reachability(generation, Err(Error::Io(std::io::Error::other("probe"))));
        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.engine.loads(), vec!["https://cdn/a.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_reachability_ignored() {
        let mut f = fixture(true, None);
        f.session.show_video(video("http://cdn/1#http://cdn/2"));
        let stale = f.session.generation;
        f.session.select_episode(1);

        f.session.on_reachability(stale, Ok(false));
        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert!(f.engine.loads().is_empty());
    }

    #[tokio::test]
    async fn test_previous_episode_events_ignored_during_reachability_wait() {
        let mut f = fixture(true, None);
        f.session.show_video(video("http://cdn/a#http://cdn/b"));
        pump(&mut f.session).await;
        f.session.on_engine_event(EngineEvent::Ready);
        assert_eq!(f.session.state(), PlaybackState::Ready);

        f.session.select_episode(1);
        assert_eq!(f.engine.calls().last(), Some(&Call::Pause));

        // Still addressed to the episode being left
        f.session.on_engine_event(EngineEvent::Buffering);
        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::Ended);
        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.session.playback().current_index(), 1);
        assert!(!f.session.subscribe_state().borrow().buffering);

        pump(&mut f.session).await;
        assert_eq!(
            f.engine.loads(),
            vec!["http://cdn/a".to_string(), "http://cdn/b".to_string()]
        );

        f.session.on_engine_event(EngineEvent::Ready);
        assert_eq!(f.session.state(), PlaybackState::Ready);
    }

    #[tokio::test]
    async fn test_bad_selection_pauses_engine() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a"));
        f.session.on_engine_event(EngineEvent::Ready);

        f.session.select_episode(9);
        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::EpisodeNotFound)
        );
        assert_eq!(f.engine.calls().last(), Some(&Call::Pause));

        f.session.on_engine_event(EngineEvent::IsPlayingChanged(true));
        assert!(!f.session.subscribe_state().borrow().is_playing);
        assert_eq!(f.repository.plays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_previous_video_events_ignored_during_fetch() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a"));
        f.session.on_engine_event(EngineEvent::Ready);
        let plays_before = f.engine.calls().iter().filter(|c| **c == Call::Play).count();

        f.session.load_video(42);
        assert_eq!(f.engine.calls().last(), Some(&Call::Pause));

        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::IsPlayingChanged(true));
        assert_eq!(f.session.state(), PlaybackState::Loading);
        let plays_after = f.engine.calls().iter().filter(|c| **c == Call::Play).count();
        assert_eq!(plays_after, plays_before);

        // The repository has no video 42
        pump(&mut f.session).await;
        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::VideoUnavailable)
        );
    }

    #[tokio::test]
    async fn test_invalid_transition_refused() {
        let mut f = fixture(true, None);
        assert!(matches!(
            f.session.transition(PlaybackState::Ended),
            Err(Error::InvalidStateTransition { .. })
        ));
        assert_eq!(f.session.state(), PlaybackState::Idle);

        f.session.transition(PlaybackState::Loading).unwrap();
        f.session.transition(PlaybackState::Ready).unwrap();
        assert!(f.session.transition(PlaybackState::Ready).is_err());
        assert_eq!(f.session.state(), PlaybackState::Ready);
    }

    #[tokio::test]
    async fn test_empty_and_blank_urls() {
        let mut f = fixture(true, None);
        f.session.show_video(video(""));
        assert_eq!(f.session.state(), PlaybackState::Error(PlaybackFault::NoEpisodes));

        let mut f = fixture(true, None);
        f.session.show_video(video("   "));
        assert_eq!(f.session.state(), PlaybackState::Error(PlaybackFault::InvalidUrl));
        assert!(f.engine.loads().is_empty());
    }

    #[tokio::test]
    async fn test_select_out_of_range_keeps_index() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.select_episode(5);

        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::EpisodeNotFound)
        );
        assert_eq!(f.session.playback().current_index(), 0);

        f.session.retry();
        assert_eq!(f.session.state(), PlaybackState::Loading);
    }

    #[tokio::test]
    async fn test_reselecting_same_episode_is_noop() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.on_engine_event(EngineEvent::Ready);
        f.engine.set_position(5_000);
        f.session.capture_position();
        let calls_before = f.engine.calls().len();

        f.session.select_episode(0);

        assert_eq!(f.session.state(), PlaybackState::Ready);
        assert_eq!(f.session.playback().position_ms(), 5_000);
        assert_eq!(f.engine.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_select_other_episode_resets_position_and_flag() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::IsPlayingChanged(true));
        f.engine.set_position(5_000);
        f.session.capture_position();
        assert!(f.session.playback().play_recorded());

        f.session.select_episode(1);

        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.session.playback().position_ms(), 0);
        assert!(!f.session.playback().play_recorded());
        assert_eq!(f.engine.loads().last().map(String::as_str), Some("/b"));
    }

    #[tokio::test]
    async fn test_play_recorded_once_per_episode() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.on_engine_event(EngineEvent::Ready);

        for _ in 0..3 {
            f.session.on_engine_event(EngineEvent::IsPlayingChanged(true));
            f.session.on_engine_event(EngineEvent::IsPlayingChanged(false));
        }
        pump(&mut f.session).await;
        assert_eq!(f.repository.plays.load(Ordering::SeqCst), 1);
        // The failed increment is swallowed
        assert_eq!(f.session.state(), PlaybackState::Ready);

        f.session.on_engine_event(EngineEvent::Ended);
        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::IsPlayingChanged(true));
        pump(&mut f.session).await;
        assert_eq!(f.repository.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ended_advances_then_stays_ended() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::Ended);

        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.session.playback().current_index(), 1);
        assert_eq!(f.session.playback().position_ms(), 0);
        assert_eq!(f.engine.loads(), vec!["/a".to_string(), "/b".to_string()]);

        f.session.on_engine_event(EngineEvent::Ready);
        f.session.on_engine_event(EngineEvent::Ended);
        assert_eq!(f.session.state(), PlaybackState::Ended);
        assert_eq!(f.engine.loads().len(), 2);
    }

    #[tokio::test]
    async fn test_engine_error_maps_to_fault() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a"));
        f.session.on_engine_event(EngineEvent::Ready);
        f.session
            .on_engine_event(EngineEvent::Error(EngineErrorCode::IO_BAD_HTTP_STATUS));

        assert_eq!(
            f.session.state(),
            PlaybackState::Error(PlaybackFault::Engine(EngineFault::NotFound))
        );
        assert_eq!(
            f.session.subscribe_state().borrow().error_message.as_deref(),
            Some("Video source not found")
        );

        f.session.retry();
        assert_eq!(f.session.state(), PlaybackState::Loading);
        assert_eq!(f.engine.loads().len(), 2);
    }

    #[tokio::test]
    async fn test_restored_snapshot_seeks_on_ready() {
        let restored = SessionSnapshot::new(30_000, false, 1);
        let mut f = fixture(true, Some(restored));
        f.session.show_video(video("/a#/b#/c"));

        assert_eq!(f.session.playback().current_index(), 1);
        assert_eq!(f.engine.loads(), vec!["/b".to_string()]);

        f.session.on_engine_event(EngineEvent::Ready);
        assert!(f.engine.calls().contains(&Call::Seek(30_000)));
        // play_when_ready was false when suspended
        assert!(!f.engine.calls().contains(&Call::Play));
    }

    #[tokio::test]
    async fn test_restored_index_out_of_range_starts_over() {
        let restored = SessionSnapshot::new(30_000, true, 7);
        let mut f = fixture(true, Some(restored));
        f.session.show_video(video("/a#/b"));

        assert_eq!(f.session.playback().current_index(), 0);
        assert_eq!(f.session.playback().position_ms(), 0);
    }

    #[tokio::test]
    async fn test_suspend_resume_round_trip() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a#/b"));
        f.session.on_engine_event(EngineEvent::Ready);
        f.engine.set_position(12_345);

        f.session.suspend().await.unwrap();
        assert_eq!(f.engine.calls().last(), Some(&Call::Pause));

        f.engine.set_position(0);
        f.session.resume().await.unwrap();
        assert!(f.engine.calls().contains(&Call::Seek(12_345)));
        assert_eq!(f.engine.calls().last(), Some(&Call::Play));
    }

    #[tokio::test]
    async fn test_speed_validation() {
        let mut f = fixture(true, None);
        assert!(matches!(f.session.set_speed(10.0), Err(Error::InvalidSpeed { .. })));
        f.session.set_speed(1.5).unwrap();
        assert_eq!(f.engine.calls(), vec![Call::Speed(1.5)]);
    }

    #[tokio::test]
    async fn test_shutdown_releases_once() {
        let mut f = fixture(true, None);
        f.session.show_video(video("/a"));
        f.session.shutdown().await.unwrap();
        drop(f.session);

        let releases = f
            .engine
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Release)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn test_playback_session_invariants() {
        let episodes = vec![Episode::new("a", "/a"), Episode::new("b", "/b")];
        let mut playback = PlaybackSession::new(episodes, 0, 900, true);
        assert!(playback.mark_play_recorded());
        assert!(!playback.mark_play_recorded());

        assert!(playback.select(0));
        assert_eq!(playback.position_ms(), 900);
        assert!(playback.play_recorded());

        assert!(!playback.select(2));
        assert_eq!(playback.current_index(), 0);

        assert!(playback.select(1));
        assert_eq!(playback.position_ms(), 0);
        assert!(!playback.play_recorded());
        assert_eq!(playback.next_index(), None);
    }
}
