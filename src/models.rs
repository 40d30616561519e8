use serde::{Deserialize, Serialize};

/// A playlist entry. `id` is the host file identifier (or a plain URL when the
/// player runs in direct mode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default = "default_artist")]
    pub artist: String,
}

fn default_artist() -> String {
    "Unknown Artist".to_string()
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_without_artist() {
        let track: Track = serde_json::from_str(r#"{"id":"abc","title":"Song"}"#).unwrap();
        assert_eq!(track.artist, "Unknown Artist");
    }
}
