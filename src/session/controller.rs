use crate::audio::engine::{
    subscribe, EngineEvent, MediaErrorCode, PlayRejected, PlaybackEngine, Subscription,
    TaggedEvent,
};
use crate::events::{
    FailedPayload, PlaybackState, PlayerEvent, ProgressPayload, SourceChangedPayload,
    StateChangedPayload, VolumeChangedPayload,
};
use crate::models::Track;
use crate::source::{CandidateList, SourceResolver};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

pub const DEFAULT_RETRY_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Delay between binding a fallback candidate and asking it to play.
    pub retry_settle: Duration,
    /// How long a single candidate may stay loading, either before its first
    /// metadata or after a `Waiting`, before it counts as failed. `None`
    /// waits forever.
    pub stall_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retry_settle: DEFAULT_RETRY_SETTLE,
            stall_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayReason {
    Autoplay,
    User,
    Retry,
}

/// A resolved `play()` request, tagged with the binding it was issued for.
#[derive(Debug)]
pub struct PlayOutcome {
    pub generation: u64,
    pub reason: PlayReason,
    pub result: Result<(), PlayRejected>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    TrackEnded,
}

/// Read-only view of the controller, published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub track: Option<Track>,
    /// 0-based position of `track` in the playlist.
    pub track_index: usize,
    pub track_count: usize,
    pub phase: PlaybackState,
    pub candidate_index: usize,
    pub candidate_count: usize,
    pub active_url: Option<String>,
    pub play_intent: bool,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub view_url: Option<String>,
}

impl SessionSnapshot {
    pub fn idle(volume: f64, muted: bool) -> Self {
        Self {
            track: None,
            track_index: 0,
            track_count: 0,
            phase: PlaybackState::Idle,
            candidate_index: 0,
            candidate_count: 0,
            active_url: None,
            play_intent: false,
            is_loading: false,
            error_message: None,
            current_time: 0.0,
            duration: 0.0,
            volume,
            muted,
            view_url: None,
        }
    }

    /// 1-based number of the candidate currently bound.
    pub fn attempt(&self) -> usize {
        self.candidate_index + 1
    }
}

/// Per-track state. Replaced wholesale on every track change.
#[derive(Debug)]
struct Session {
    track: Track,
    candidates: CandidateList,
    play_intent: bool,
    is_loading: bool,
    error_message: Option<String>,
    current_time: f64,
    duration: f64,
    metadata_ready: bool,
    resume_at: Option<f64>,
    phase: PlaybackState,
}

impl Session {
    fn new(track: Track, candidates: CandidateList) -> Self {
        Self {
            track,
            candidates,
            play_intent: true,
            is_loading: true,
            error_message: None,
            current_time: 0.0,
            duration: 0.0,
            metadata_ready: false,
            resume_at: None,
            phase: PlaybackState::Loading,
        }
    }
}

/// Owns the playback session state and drives the engine through source
/// fallback, autoplay and user intents.
///
/// Every source binding gets a new generation. Engine events and play
/// outcomes carry the generation they were produced for and are dropped when
/// it no longer matches.
pub struct SessionController<E, R> {
    engine: E,
    resolver: R,
    credential: Option<String>,
    settings: SessionSettings,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    notify: broadcast::Sender<PlayerEvent>,
    state_tx: watch::Sender<SessionSnapshot>,
    last_state: Option<(PlaybackState, bool)>,
    generation: u64,
    subscription: Option<Subscription>,
    session: Option<Session>,
    playlist_position: (usize, usize),
    volume: f64,
    muted: bool,
    pending_plays: FuturesUnordered<BoxFuture<'static, PlayOutcome>>,
    scheduled_play: Option<(u64, Instant)>,
    stall_deadline: Option<(u64, Instant)>,
}

impl<E: PlaybackEngine, R: SourceResolver> SessionController<E, R> {
    pub fn new(
        mut engine: E,
        resolver: R,
        settings: SessionSettings,
        events_tx: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        let (notify, _) = broadcast::channel(64);
        let (state_tx, _) = watch::channel(SessionSnapshot::idle(1.0, false));
        engine.set_volume(1.0);
        engine.set_muted(false);
        Self {
            engine,
            resolver,
            credential: None,
            settings,
            events_tx,
            notify,
            state_tx,
            last_state: None,
            generation: 0,
            subscription: None,
            session: None,
            playlist_position: (0, 0),
            volume: 1.0,
            muted: false,
            pending_plays: FuturesUnordered::new(),
            scheduled_play: None,
            stall_deadline: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_volume(mut self, volume: f64, muted: bool) -> Self {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.muted = muted;
        self.engine.set_volume(self.volume);
        self.engine.set_muted(self.muted);
        self.publish_state();
        self
    }

    /// Records where the next loaded track sits in the playlist.
    pub fn set_playlist_position(&mut self, index: usize, track_count: usize) {
        self.playlist_position = (index, track_count);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.notify.subscribe()
    }

    pub fn notifier(&self) -> broadcast::Sender<PlayerEvent> {
        self.notify.clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn emit(&self, event: PlayerEvent) {
        // No receivers is fine.
        let _ = self.notify.send(event);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> PlaybackState {
        self.session
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(PlaybackState::Idle)
    }

    pub fn track(&self) -> Option<&Track> {
        self.session.as_ref().map(|s| &s.track)
    }

    pub fn candidate_index(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.candidates.index())
            .unwrap_or(0)
    }

    pub fn candidate_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.candidates.len())
            .unwrap_or(0)
    }

    pub fn active_url(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.candidates.current())
    }

    pub fn play_intent(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.play_intent)
    }

    pub fn is_loading(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_loading)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|s| s.error_message.as_deref())
    }

    pub fn current_time(&self) -> f64 {
        self.session.as_ref().map(|s| s.current_time).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.session.as_ref().map(|s| s.duration).unwrap_or(0.0)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let Some(session) = self.session.as_ref() else {
            return SessionSnapshot::idle(self.volume, self.muted);
        };
        let (track_index, track_count) = self.playlist_position;
        SessionSnapshot {
            track: Some(session.track.clone()),
            track_index,
            track_count,
            phase: session.phase,
            candidate_index: session.candidates.index(),
            candidate_count: session.candidates.len(),
            active_url: Some(session.candidates.current().to_string()),
            play_intent: session.play_intent,
            is_loading: session.is_loading,
            error_message: session.error_message.clone(),
            current_time: session.current_time,
            duration: session.duration,
            volume: self.volume,
            muted: self.muted,
            view_url: self.resolver.view_url(&session.track.id),
        }
    }

    /// Starts a fresh session for `track` and attempts autoplay.
    pub fn load_track(&mut self, track: Track) {
        let mut urls = self
            .resolver
            .resolve(&track.id, self.credential.as_deref());
        if urls.is_empty() {
            log::warn!(
                "[load_track] resolver produced no candidates for {}, using the id as URL",
                track.id
            );
            urls.push(track.id.clone());
        }
        let Some(candidates) = CandidateList::new(urls) else {
            return;
        };

        log::info!(
            "[load_track] {} - {} ({} candidates)",
            track.artist,
            track.title,
            candidates.len()
        );
        self.session = Some(Session::new(track, candidates));
        self.bind_current();
        self.request_play(PlayReason::Autoplay);
        self.publish_state();
    }

    /// Replaces the access credential and rebuilds the candidates for the
    /// current track.
    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
        if let Some(track) = self.session.as_ref().map(|s| s.track.clone()) {
            self.load_track(track);
        }
    }

    pub fn handle_engine_event(&mut self, tagged: TaggedEvent) -> Option<SessionSignal> {
        if tagged.generation != self.generation {
            log::debug!(
                "Ignoring {:?} from stale binding {} (current {})",
                tagged.event,
                tagged.generation,
                self.generation
            );
            return None;
        }
        let session = self.session.as_mut()?;

        match tagged.event {
            EngineEvent::MetadataReady { duration } => {
                session.duration = if duration.is_finite() && duration > 0.0 {
                    duration
                } else {
                    0.0
                };
                session.is_loading = false;
                session.error_message = None;
                session.metadata_ready = true;
                session.phase = if session.play_intent {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Ready
                };
                let resume_at = session.resume_at.take();
                self.stall_deadline = None;
                if let Some(position) = resume_at {
                    log::info!("Resuming fallback source at {:.1}s", position);
                    self.engine.seek(position);
                }
                self.publish_state();
            }
            EngineEvent::TimeUpdate { current_time } => {
                if current_time.is_finite() {
                    session.current_time = current_time.max(0.0);
                    self.emit_progress();
                    self.publish_state();
                }
            }
            EngineEvent::Waiting => {
                session.is_loading = true;
                if let Some(timeout) = self.settings.stall_timeout {
                    self.stall_deadline
                        .get_or_insert((self.generation, Instant::now() + timeout));
                }
                self.publish_state();
            }
            EngineEvent::CanPlay => {
                session.is_loading = false;
                self.stall_deadline = None;
                self.publish_state();
            }
            EngineEvent::Ended => {
                log::info!("[session] track ended: {}", session.track.id);
                session.play_intent = false;
                session.phase = PlaybackState::Paused;
                self.publish_state();
                return Some(SessionSignal::TrackEnded);
            }
            EngineEvent::Error { code } => self.fail_over(code),
        }
        None
    }

    pub fn handle_play_outcome(&mut self, outcome: PlayOutcome) {
        if outcome.generation != self.generation {
            log::debug!(
                "Ignoring {:?} play outcome from stale binding {}",
                outcome.reason,
                outcome.generation
            );
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase == PlaybackState::Failed {
            return;
        }

        match outcome.result {
            Ok(()) => {
                if session.play_intent && session.metadata_ready {
                    session.phase = PlaybackState::Playing;
                }
            }
            Err(rejected) => {
                match outcome.reason {
                    PlayReason::Autoplay => {
                        log::info!("Autoplay prevented, waiting for user interaction: {}", rejected)
                    }
                    PlayReason::User => log::warn!("Play interaction failed: {}", rejected),
                    PlayReason::Retry => log::info!("Fallback play suppressed: {}", rejected),
                }
                session.play_intent = false;
                if session.metadata_ready {
                    session.phase = PlaybackState::Paused;
                }
            }
        }
        self.publish_state();
    }

    /// Next resolved `play()` request. Returns `None` when none is in flight.
    pub async fn next_play_outcome(&mut self) -> Option<PlayOutcome> {
        self.pending_plays.next().await
    }

    /// Earliest pending timer (fallback play or stall check).
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.scheduled_play, self.stall_deadline]
            .into_iter()
            .flatten()
            .map(|(_, at)| at)
            .min()
    }

    /// Fires every timer due at `now`.
    pub fn on_deadline(&mut self, now: Instant) {
        if let Some((generation, at)) = self.scheduled_play {
            if at <= now {
                self.scheduled_play = None;
                if generation == self.generation && self.play_intent() {
                    self.request_play(PlayReason::Retry);
                }
            }
        }
        if let Some((generation, at)) = self.stall_deadline {
            if at <= now {
                self.stall_deadline = None;
                if generation == self.generation && self.is_loading() {
                    log::warn!(
                        "[session] attempt {} stalled, treating as network failure",
                        self.candidate_index() + 1
                    );
                    self.fail_over(MediaErrorCode::Network);
                }
            }
        }
    }

    pub fn toggle_play(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase == PlaybackState::Failed {
            self.retry();
            return;
        }

        session.play_intent = !session.play_intent;
        let intent = session.play_intent;
        if session.metadata_ready {
            session.phase = if intent {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            };
        }
        if intent {
            self.request_play(PlayReason::User);
        } else {
            self.engine.pause();
        }
        self.publish_state();
    }

    /// Starts over from the first candidate and clears any error. Does not
    /// force playback.
    pub fn retry(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        log::info!("[session] manual retry for {}", session.track.id);
        session.candidates.reset();
        session.error_message = None;
        session.is_loading = true;
        session.metadata_ready = false;
        session.resume_at = None;
        session.phase = PlaybackState::Loading;
        let resume_playback = session.play_intent;

        self.bind_current();
        if resume_playback {
            self.request_play(PlayReason::Retry);
        }
        self.publish_state();
    }

    pub fn seek(&mut self, position: f64) {
        if !position.is_finite() {
            log::debug!("Ignoring seek to {}", position);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let position = position.max(0.0);
        session.current_time = position;
        self.engine.seek(position);
        self.emit_progress();
        self.publish_state();
    }

    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.engine.set_volume(self.volume);
        if self.volume > 0.0 && self.muted {
            self.muted = false;
            self.engine.set_muted(false);
        }
        self.emit_volume();
        self.publish_state();
    }

    pub fn step_volume(&mut self, delta: f64) {
        self.set_volume(self.volume + delta);
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.engine.set_muted(self.muted);
        self.emit_volume();
        self.publish_state();
    }

    /// Releases the current binding and unloads the engine.
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        self.engine.unload();
        self.session = None;
        self.pending_plays.clear();
        self.scheduled_play = None;
        self.stall_deadline = None;
        self.publish_state();
    }

    fn fail_over(&mut self, code: MediaErrorCode) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase == PlaybackState::Failed {
            log::debug!("Ignoring {:?} after all strategies failed", code);
            return;
        }
        log::warn!(
            "Audio error on attempt {} of {} ({}): {:?}",
            session.candidates.index() + 1,
            session.candidates.len(),
            session.track.id,
            code
        );

        if session.candidates.advance() {
            log::info!("Retrying with next strategy...");
            session.phase = PlaybackState::Retrying;
            session.is_loading = true;
            session.metadata_ready = false;
            if session.current_time > 0.0 {
                session.resume_at = Some(session.current_time);
            }
            self.bind_current();
            self.scheduled_play = Some((
                self.generation,
                Instant::now() + self.settings.retry_settle,
            ));
        } else {
            let message = code.message().to_string();
            log::error!(
                "All {} strategies failed for {}: {}",
                session.candidates.len(),
                session.track.id,
                message
            );
            session.error_message = Some(message.clone());
            session.play_intent = false;
            session.is_loading = false;
            session.phase = PlaybackState::Failed;
            let view_url = self.resolver.view_url(&session.track.id);
            self.scheduled_play = None;
            self.stall_deadline = None;
            self.emit(PlayerEvent::Failed(FailedPayload { message, view_url }));
        }
        self.publish_state();
    }

    /// Binds the session's current candidate under a new generation,
    /// releasing the previous subscription first.
    fn bind_current(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let url = session.candidates.current().to_string();
        let attempt = session.candidates.index() + 1;
        let candidate_count = session.candidates.len();

        if let Some(previous) = self.subscription.take() {
            previous.release();
        }
        self.generation += 1;
        self.scheduled_play = None;
        // Covers a candidate whose connection hangs before any event arrives.
        self.stall_deadline = self
            .settings
            .stall_timeout
            .map(|timeout| (self.generation, Instant::now() + timeout));

        let (sink, subscription) = subscribe(self.generation, self.events_tx.clone());
        self.subscription = Some(subscription);
        log::info!(
            "Binding attempt {}/{} (generation {})",
            attempt,
            candidate_count,
            self.generation
        );
        self.engine.set_source(&url, sink);
        self.emit(PlayerEvent::SourceChanged(SourceChangedPayload {
            attempt,
            candidate_count,
            url,
        }));
    }

    fn request_play(&mut self, reason: PlayReason) {
        let generation = self.generation;
        let request = self.engine.play();
        self.pending_plays.push(
            async move {
                PlayOutcome {
                    generation,
                    reason,
                    result: request.await,
                }
            }
            .boxed(),
        );
    }

    fn emit_progress(&self) {
        let position = self.current_time();
        let duration = self.duration();
        let position_fraction = if duration > 0.0 {
            (position / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.emit(PlayerEvent::Progress(ProgressPayload {
            position,
            duration,
            position_fraction,
        }));
    }

    fn emit_volume(&self) {
        self.emit(PlayerEvent::VolumeChanged(VolumeChangedPayload {
            volume: self.volume,
            muted: self.muted,
        }));
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        let state = (snapshot.phase, snapshot.is_loading);
        if self.last_state != Some(state) {
            self.last_state = Some(state);
            self.emit(PlayerEvent::StateChanged(StateChangedPayload {
                state: snapshot.phase,
                is_loading: snapshot.is_loading,
            }));
        }
        self.state_tx.send_replace(snapshot);
    }
}
