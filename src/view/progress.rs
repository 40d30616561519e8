use crate::util::format_time;
use serde::Serialize;

/// Upper bound of the seek slider while the duration is still unknown.
pub const SEEK_MAX_FALLBACK: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub percent: f64,
    pub seek_max: f64,
    pub elapsed: String,
    pub total: String,
}

impl ProgressView {
    pub fn render(current_time: f64, duration: f64) -> Self {
        let known = duration.is_finite() && duration > 0.0;
        let percent = if known {
            (current_time / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            percent,
            seek_max: if known { duration } else { SEEK_MAX_FALLBACK },
            elapsed: format_time(current_time),
            total: format_time(duration),
        }
    }

    /// Bounds a slider value to the seekable range. Non-finite values pass
    /// through untouched so the controller can reject them.
    pub fn clamp_seek(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(0.0, self.seek_max)
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_duration_falls_back() {
        let view = ProgressView::render(12.0, 0.0);
        assert_eq!(view.percent, 0.0);
        assert_eq!(view.seek_max, SEEK_MAX_FALLBACK);
        assert_eq!(view.total, "0:00");

        let view = ProgressView::render(12.0, f64::NAN);
        assert_eq!(view.seek_max, SEEK_MAX_FALLBACK);
    }

    #[test]
    fn percent_follows_position() {
        let view = ProgressView::render(45.0, 180.0);
        assert_eq!(view.percent, 25.0);
        assert_eq!(view.elapsed, "0:45");
        assert_eq!(view.total, "3:00");
    }

    #[test]
    fn seek_is_bounded_to_duration() {
        let view = ProgressView::render(0.0, 90.0);
        assert_eq!(view.clamp_seek(120.0), 90.0);
        assert_eq!(view.clamp_seek(-4.0), 0.0);
        assert!(view.clamp_seek(f64::NAN).is_nan());
    }
}
