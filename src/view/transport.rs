use crate::events::PlaybackState;
use crate::session::SessionSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportIcon {
    Play,
    Pause,
}

impl TransportIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            TransportIcon::Play => ">",
            TransportIcon::Pause => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportView {
    pub icon: TransportIcon,
    /// Skip and play controls are greyed out while the track has failed.
    pub enabled: bool,
}

impl TransportView {
    pub fn render(snapshot: &SessionSnapshot) -> Self {
        let icon = if snapshot.phase == PlaybackState::Playing {
            TransportIcon::Pause
        } else {
            TransportIcon::Play
        };
        Self {
            icon,
            enabled: snapshot.phase != PlaybackState::Failed,
        }
    }
}
