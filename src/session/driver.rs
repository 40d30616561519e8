use crate::audio::engine::{PlaybackEngine, TaggedEvent};
use crate::audio::queue::TrackSequencer;
use crate::commands::{PlayerHandle, UserIntent};
use crate::events::{PlayerEvent, TrackChangedPayload};
use crate::session::controller::{
    PlayOutcome, SessionController, SessionSettings, SessionSignal,
};
use crate::source::SourceResolver;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub credential: Option<String>,
    pub settings: SessionSettings,
    pub volume: f64,
    pub muted: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            credential: None,
            settings: SessionSettings::default(),
            volume: 1.0,
            muted: false,
        }
    }
}

enum Input {
    Engine(TaggedEvent),
    Play(PlayOutcome),
    User(UserIntent),
    Deadline,
}

/// Single-threaded event loop tying the controller to the playlist, the
/// engine's event stream and user intents.
pub struct PlayerSession<E, R> {
    controller: SessionController<E, R>,
    sequencer: TrackSequencer,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    intents_rx: mpsc::UnboundedReceiver<UserIntent>,
}

impl<E: PlaybackEngine, R: SourceResolver> PlayerSession<E, R> {
    pub fn new(
        engine: E,
        resolver: R,
        sequencer: TrackSequencer,
        options: SessionOptions,
    ) -> (Self, PlayerHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();

        let controller = SessionController::new(engine, resolver, options.settings, events_tx)
            .with_credential(options.credential)
            .with_volume(options.volume, options.muted);
        let handle = PlayerHandle::new(intents_tx, controller.notifier(), controller.watch());

        (
            Self {
                controller,
                sequencer,
                events_rx,
                intents_rx,
            },
            handle,
        )
    }

    /// Runs until a shutdown intent arrives or every handle is dropped.
    pub async fn run(mut self) {
        log::info!(
            "Player session started with {} tracks",
            self.sequencer.len()
        );
        self.load_current();

        loop {
            let deadline = self.controller.next_deadline();
            let input = tokio::select! {
                Some(event) = self.events_rx.recv() => Input::Engine(event),
                Some(outcome) = self.controller.next_play_outcome() => Input::Play(outcome),
                intent = self.intents_rx.recv() => {
                    Input::User(intent.unwrap_or(UserIntent::Shutdown))
                }
                _ = wait_until(deadline) => Input::Deadline,
            };

            match input {
                Input::Engine(event) => {
                    if let Some(SessionSignal::TrackEnded) =
                        self.controller.handle_engine_event(event)
                    {
                        self.sequencer.advance();
                        self.load_current();
                    }
                }
                Input::Play(outcome) => self.controller.handle_play_outcome(outcome),
                Input::Deadline => self.controller.on_deadline(Instant::now()),
                Input::User(UserIntent::Shutdown) => break,
                Input::User(intent) => self.handle_intent(intent),
            }
        }

        log::info!("Player session shutting down");
        self.controller.shutdown();
    }

    fn handle_intent(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::TogglePlay => self.controller.toggle_play(),
            UserIntent::Seek(position) => self.controller.seek(position),
            UserIntent::SetVolume(volume) => self.controller.set_volume(volume),
            UserIntent::StepVolume(delta) => self.controller.step_volume(delta),
            UserIntent::ToggleMute => self.controller.toggle_mute(),
            UserIntent::Retry => self.controller.retry(),
            UserIntent::Next => {
                self.sequencer.advance();
                self.load_current();
            }
            UserIntent::Previous => {
                self.sequencer.retreat();
                self.load_current();
            }
            UserIntent::Shutdown => {}
        }
    }

    fn load_current(&mut self) {
        let track = self.sequencer.current().clone();
        self.controller
            .emit(PlayerEvent::TrackChanged(TrackChangedPayload {
                track_id: track.id.clone(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                index: self.sequencer.index(),
                track_count: self.sequencer.len(),
            }));
        self.controller
            .set_playlist_position(self.sequencer.index(), self.sequencer.len());
        self.controller.load_track(track);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
