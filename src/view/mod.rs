//! Stateless renderers. Each view is a pure function of a
//! [`SessionSnapshot`]; user input goes back through
//! [`crate::commands::PlayerHandle`].

mod progress;
mod status;
mod transport;
mod volume;

pub use progress::{ProgressView, SEEK_MAX_FALLBACK};
pub use status::StatusView;
pub use transport::{TransportIcon, TransportView};
pub use volume::{VolumeIcon, VolumeView};

use crate::session::SessionSnapshot;
use serde::Serialize;
use std::fmt;

/// Where the current track sits in the playlist, 1-based for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPosition {
    pub number: usize,
    pub track_count: usize,
}

impl PlaylistPosition {
    pub fn render(snapshot: &SessionSnapshot) -> Option<Self> {
        if snapshot.track.is_none() || snapshot.track_count == 0 {
            return None;
        }
        Some(Self {
            number: snapshot.track_index.min(snapshot.track_count - 1) + 1,
            track_count: snapshot.track_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub title: String,
    pub artist: String,
    pub position: Option<PlaylistPosition>,
    pub progress: ProgressView,
    pub transport: TransportView,
    pub volume: VolumeView,
    pub status: StatusView,
}

impl PlayerView {
    pub fn render(snapshot: &SessionSnapshot) -> Self {
        let (title, artist) = snapshot
            .track
            .as_ref()
            .map(|t| (t.title.clone(), t.artist.clone()))
            .unwrap_or_else(|| ("Unknown Track".to_string(), "Unknown Artist".to_string()));

        Self {
            title,
            artist,
            position: PlaylistPosition::render(snapshot),
            progress: ProgressView::render(snapshot.current_time, snapshot.duration),
            transport: TransportView::render(snapshot),
            volume: VolumeView::render(snapshot.volume, snapshot.muted),
            status: StatusView::render(snapshot),
        }
    }
}

impl fmt::Display for PlayerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {}",
            self.transport.icon.glyph(),
            self.artist,
            self.title,
        )?;
        if let Some(position) = self.position {
            write!(f, " [{}/{}]", position.number, position.track_count)?;
        }
        write!(
            f,
            "  {} / {} ({:.0}%)  vol {:.0}%{}",
            self.progress.elapsed,
            self.progress.total,
            self.progress.percent,
            self.volume.width_percent,
            if self.volume.icon == VolumeIcon::Muted {
                " [muted]"
            } else {
                ""
            }
        )?;
        if let Some(status) = self.status.describe() {
            write!(f, "  {}", status)?;
        }
        Ok(())
    }
}
