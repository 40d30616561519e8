use serde::Serialize;

pub const PLAYBACK_PROGRESS: &str = "playback:progress";
pub const PLAYBACK_TRACK_CHANGED: &str = "playback:track-changed";
pub const PLAYBACK_STATE_CHANGED: &str = "playback:state-changed";
pub const PLAYBACK_SOURCE_CHANGED: &str = "playback:source-changed";
pub const PLAYBACK_VOLUME_CHANGED: &str = "playback:volume-changed";
pub const PLAYBACK_FAILED: &str = "playback:failed";

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub position: f64,
    pub duration: f64,
    pub position_fraction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackChangedPayload {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub index: usize,
    pub track_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateChangedPayload {
    pub state: PlaybackState,
    pub is_loading: bool,
}

/// Emitted whenever a new candidate URL is bound.
#[derive(Debug, Clone, Serialize)]
pub struct SourceChangedPayload {
    pub attempt: usize,
    pub candidate_count: usize,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeChangedPayload {
    pub volume: f64,
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedPayload {
    pub message: String,
    pub view_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Retrying,
    Ready,
    Playing,
    Paused,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum PlayerEvent {
    Progress(ProgressPayload),
    TrackChanged(TrackChangedPayload),
    StateChanged(StateChangedPayload),
    SourceChanged(SourceChangedPayload),
    VolumeChanged(VolumeChangedPayload),
    Failed(FailedPayload),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Progress(_) => PLAYBACK_PROGRESS,
            PlayerEvent::TrackChanged(_) => PLAYBACK_TRACK_CHANGED,
            PlayerEvent::StateChanged(_) => PLAYBACK_STATE_CHANGED,
            PlayerEvent::SourceChanged(_) => PLAYBACK_SOURCE_CHANGED,
            PlayerEvent::VolumeChanged(_) => PLAYBACK_VOLUME_CHANGED,
            PlayerEvent::Failed(_) => PLAYBACK_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let event = PlayerEvent::StateChanged(StateChangedPayload {
            state: PlaybackState::Retrying,
            is_loading: true,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "state-changed");
        assert_eq!(json["payload"]["state"], "retrying");
        assert_eq!(event.name(), PLAYBACK_STATE_CHANGED);
    }
}
