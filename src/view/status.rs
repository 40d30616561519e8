use crate::events::PlaybackState;
use crate::session::SessionSnapshot;
use serde::Serialize;

/// Loading overlay and error panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatusView {
    None,
    Loading {
        /// Set once a fallback candidate is in use.
        attempt_hint: Option<String>,
    },
    Failed {
        message: String,
        can_retry: bool,
        view_url: Option<String>,
    },
}

impl StatusView {
    pub fn render(snapshot: &SessionSnapshot) -> Self {
        if let (PlaybackState::Failed, Some(message)) =
            (snapshot.phase, snapshot.error_message.as_ref())
        {
            return StatusView::Failed {
                message: message.clone(),
                can_retry: true,
                view_url: snapshot.view_url.clone(),
            };
        }
        if snapshot.is_loading {
            let attempt_hint = (snapshot.candidate_index > 0)
                .then(|| format!("trying method {}...", snapshot.attempt()));
            return StatusView::Loading { attempt_hint };
        }
        StatusView::None
    }

    /// One-line description for text hosts.
    pub fn describe(&self) -> Option<String> {
        match self {
            StatusView::None => None,
            StatusView::Loading { attempt_hint: None } => Some("loading...".to_string()),
            StatusView::Loading {
                attempt_hint: Some(hint),
            } => Some(format!("loading, {}", hint)),
            StatusView::Failed {
                message, view_url, ..
            } => Some(match view_url {
                Some(url) => format!("{} (r to retry, or open {})", message, url),
                None => format!("{} (r to retry)", message),
            }),
        }
    }
}
