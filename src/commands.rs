use crate::error::{AppError, AppResult};
use crate::events::PlayerEvent;
use crate::session::SessionSnapshot;
use tokio::sync::{broadcast, mpsc, watch};

const VOLUME_STEP: f64 = 0.1;

/// Everything a user (or a view) can ask the player to do.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    TogglePlay,
    Seek(f64),
    SetVolume(f64),
    StepVolume(f64),
    ToggleMute,
    Next,
    Previous,
    Retry,
    Shutdown,
}

/// Cloneable front door to a running [`crate::session::PlayerSession`].
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    intents: mpsc::UnboundedSender<UserIntent>,
    events: broadcast::Sender<PlayerEvent>,
    state: watch::Receiver<SessionSnapshot>,
}

impl PlayerHandle {
    pub(crate) fn new(
        intents: mpsc::UnboundedSender<UserIntent>,
        events: broadcast::Sender<PlayerEvent>,
        state: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            intents,
            events,
            state,
        }
    }

    pub fn dispatch(&self, intent: UserIntent) -> AppResult<()> {
        log::debug!("[dispatch] {:?}", intent);
        self.intents
            .send(intent)
            .map_err(|_| AppError::SessionClosed)
    }

    pub fn toggle_play(&self) -> AppResult<()> {
        self.dispatch(UserIntent::TogglePlay)
    }

    pub fn seek(&self, position: f64) -> AppResult<()> {
        self.dispatch(UserIntent::Seek(position))
    }

    pub fn set_volume(&self, volume: f64) -> AppResult<()> {
        self.dispatch(UserIntent::SetVolume(volume))
    }

    pub fn toggle_mute(&self) -> AppResult<()> {
        self.dispatch(UserIntent::ToggleMute)
    }

    pub fn next(&self) -> AppResult<()> {
        self.dispatch(UserIntent::Next)
    }

    pub fn previous(&self) -> AppResult<()> {
        self.dispatch(UserIntent::Previous)
    }

    pub fn retry(&self) -> AppResult<()> {
        self.dispatch(UserIntent::Retry)
    }

    pub fn shutdown(&self) -> AppResult<()> {
        self.dispatch(UserIntent::Shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }
}

/// Parses a line typed into the terminal host.
///
/// `space`/`p` play-pause, `n` next, `b` back, `m` mute, `r` retry, `q` quit,
/// `+`/`-` volume step, `s <seconds>` seek, `v <0..1>` volume.
pub fn parse_command(line: &str) -> Option<UserIntent> {
    if line == " " {
        return Some(UserIntent::TogglePlay);
    }
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let argument = parts.next().and_then(|a| a.parse::<f64>().ok());

    match (command, argument) {
        ("p", _) => Some(UserIntent::TogglePlay),
        ("n", _) => Some(UserIntent::Next),
        ("b", _) => Some(UserIntent::Previous),
        ("m", _) => Some(UserIntent::ToggleMute),
        ("r", _) => Some(UserIntent::Retry),
        ("q", _) => Some(UserIntent::Shutdown),
        ("+", _) => Some(UserIntent::StepVolume(VOLUME_STEP)),
        ("-", _) => Some(UserIntent::StepVolume(-VOLUME_STEP)),
        ("s", Some(position)) => Some(UserIntent::Seek(position)),
        ("v", Some(volume)) => Some(UserIntent::SetVolume(volume)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_key_commands() {
        assert_eq!(parse_command(" "), Some(UserIntent::TogglePlay));
        assert_eq!(parse_command("p"), Some(UserIntent::TogglePlay));
        assert_eq!(parse_command("n"), Some(UserIntent::Next));
        assert_eq!(parse_command("b"), Some(UserIntent::Previous));
        assert_eq!(parse_command("m"), Some(UserIntent::ToggleMute));
        assert_eq!(parse_command("r"), Some(UserIntent::Retry));
        assert_eq!(parse_command("q"), Some(UserIntent::Shutdown));
        assert_eq!(parse_command("+"), Some(UserIntent::StepVolume(0.1)));
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(parse_command("s 42.5"), Some(UserIntent::Seek(42.5)));
        assert_eq!(parse_command("v 0.3"), Some(UserIntent::SetVolume(0.3)));
        assert_eq!(parse_command("s"), None);
        assert_eq!(parse_command("v loud"), None);
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn dispatch_after_close_reports_closed_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(4);
        let (_state_tx, state) = watch::channel(SessionSnapshot::idle(1.0, false));
        let handle = PlayerHandle::new(tx, events, state);
        drop(rx);
        assert!(matches!(handle.next(), Err(AppError::SessionClosed)));
    }
}
