use crate::error::{AppError, AppResult};
use crate::models::Track;

/// Fixed, ordered playlist with a cursor that wraps around in both
/// directions.
#[derive(Debug, Clone)]
pub struct TrackSequencer {
    tracks: Vec<Track>,
    current_index: usize,
}

impl TrackSequencer {
    pub fn new(tracks: Vec<Track>) -> AppResult<Self> {
        if tracks.is_empty() {
            return Err(AppError::EmptyPlaylist);
        }
        Ok(Self {
            tracks,
            current_index: 0,
        })
    }

    pub fn current(&self) -> &Track {
        &self.tracks[self.current_index]
    }

    pub fn index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn advance(&mut self) -> &Track {
        let len = self.tracks.len();
        self.current_index = (self.current_index + 1) % len;
        self.current()
    }

    pub fn retreat(&mut self) -> &Track {
        let len = self.tracks.len();
        self.current_index = (self.current_index + len - 1) % len;
        self.current()
    }
}
