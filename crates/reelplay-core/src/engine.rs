//! Media engine seam
//!
//! The decoder/renderer lives outside this crate. The session drives it
//! through [`MediaEngine`] and receives its notifications as
//! [`EngineEvent`]s on a channel created with [`event_channel`].

use crate::types::EngineErrorCode;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Commands understood by a media engine
pub trait MediaEngine: Send + 'static {
    /// Replace the current media item and start preparing it
    fn load_and_prepare(&mut self, url: &str);

    fn seek_to(&mut self, position_ms: u64);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_speed(&mut self, multiplier: f32);

    /// Current playback position in milliseconds
    fn current_position(&self) -> u64;

    /// Free decoder resources; the engine is not used afterwards
    fn release(&mut self);
}

/// Notifications emitted by a media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum EngineEvent {
    Buffering,
    Ready,
    Ended,
    IsPlayingChanged(bool),
    Error(EngineErrorCode),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Channel the engine adapter uses to report notifications
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Owned engine that is released exactly once
///
/// Release happens on [`EngineHandle::release`] or, failing that, on drop.
/// Commands issued after release are ignored.
pub struct EngineHandle<E: MediaEngine> {
    engine: Option<E>,
}

impl<E: MediaEngine> EngineHandle<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    /// Run a command against the engine if it is still held
    pub fn with<R>(&mut self, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        self.engine.as_mut().map(f)
    }

    pub fn current_position(&self) -> u64 {
        self.engine.as_ref().map(|e| e.current_position()).unwrap_or(0)
    }

    pub fn release(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
            debug!("Media engine released");
        }
    }
}

impl<E: MediaEngine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: MediaEngine> std::fmt::Debug for EngineHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEngine {
        releases: Arc<AtomicUsize>,
        position: u64,
    }

    impl MediaEngine for CountingEngine {
        fn load_and_prepare(&mut self, _url: &str) {}
        fn seek_to(&mut self, position_ms: u64) {
            self.position = position_ms;
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn set_speed(&mut self, _multiplier: f32) {}
        fn current_position(&self) -> u64 {
            self.position
        }
        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_once_then_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut handle = EngineHandle::new(CountingEngine {
            releases: releases.clone(),
            position: 0,
        });

        handle.with(|e| e.seek_to(1500));
        assert_eq!(handle.current_position(), 1500);

        handle.release();
        handle.release();
        assert!(handle.is_released());
        assert_eq!(handle.current_position(), 0);
        assert_eq!(handle.with(|e| e.seek_to(10)), None);

        drop(handle);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let _handle = EngineHandle::new(CountingEngine {
                releases: releases.clone(),
                position: 0,
            });
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&EngineEvent::Error(EngineErrorCode(2004))).unwrap();
        assert_eq!(json, r#"{"event":"error","value":2004}"#);
    }
}
