//! The seam between the session controller and whatever actually plays audio.
//!
//! An engine is bound to one URL at a time. Every binding gets its own
//! [`EventSink`], tagged with the binding's generation, and the controller
//! keeps the matching [`Subscription`]. Dropping or releasing the subscription
//! silences the sink, so a superseded binding can never deliver events.

use futures_util::future::BoxFuture;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Resolves once the host has accepted or refused to start playback.
pub type PlayFuture = BoxFuture<'static, Result<(), PlayRejected>>;

/// The host refused to start playback (for example no user gesture yet, or
/// no output device). Not a media error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("play request rejected: {reason}")]
pub struct PlayRejected {
    pub reason: String,
}

impl PlayRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Standard media error codes, as reported by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Unknown,
}

impl MediaErrorCode {
    /// User-facing text shown once every candidate has failed.
    pub fn message(self) -> &'static str {
        match self {
            Self::Aborted => "playback interrupted",
            Self::Network => "network error reaching host",
            Self::Decode => "decode failure",
            Self::SourceNotSupported => "host blocked playback — resource may not be public",
            Self::Unknown => "unknown error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MetadataReady { duration: f64 },
    TimeUpdate { current_time: f64 },
    Ended,
    Waiting,
    CanPlay,
    Error { code: MediaErrorCode },
}

/// An engine event stamped with the generation of the binding that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sending half of a binding's event stream. Cheap to clone into engine
/// threads and callbacks.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    active: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    /// Delivers `event` unless the subscription was released. Returns whether
    /// the event was delivered.
    pub fn emit(&self, event: EngineEvent) -> bool {
        if !self.is_active() {
            log::debug!(
                "Dropping {:?} from released binding {}",
                event,
                self.generation
            );
            return false;
        }
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Controller-side handle of a binding's event stream. Released on drop.
#[derive(Debug)]
pub struct Subscription {
    generation: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn release(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

pub fn subscribe(
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
) -> (EventSink, Subscription) {
    let active = Arc::new(AtomicBool::new(true));
    let sink = EventSink {
        generation,
        active: Arc::clone(&active),
        tx,
    };
    (sink, Subscription { generation, active })
}

/// A single playable media handle, bound to one URL at a time.
pub trait PlaybackEngine {
    /// Rebinds the handle to `url` and starts a fresh load cycle. Events for
    /// the new binding must only be sent through `sink`.
    fn set_source(&mut self, url: &str, sink: EventSink);

    fn play(&mut self) -> PlayFuture;

    fn pause(&mut self);

    fn seek(&mut self, position: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    /// Drops the current binding without starting a new one.
    fn unload(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_message() {
        for code in [
            MediaErrorCode::Aborted,
            MediaErrorCode::Network,
            MediaErrorCode::Decode,
            MediaErrorCode::SourceNotSupported,
            MediaErrorCode::Unknown,
        ] {
            assert!(!code.message().is_empty());
        }
    }

    #[test]
    fn sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (sink, _subscription) = subscribe(7, tx);
        assert!(sink.emit(EngineEvent::CanPlay));
        assert_eq!(
            rx.try_recv().unwrap(),
            TaggedEvent {
                generation: 7,
                event: EngineEvent::CanPlay
            }
        );
    }

    #[test]
    fn released_subscription_silences_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (sink, subscription) = subscribe(1, tx);
        let cloned = sink.clone();
        subscription.release();
        assert!(!sink.emit(EngineEvent::Ended));
        assert!(!cloned.is_active());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscription_silences_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (sink, subscription) = subscribe(2, tx);
        drop(subscription);
        assert!(!sink.emit(EngineEvent::Waiting));
        assert!(rx.try_recv().is_err());
    }
}
