use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeIcon {
    Muted,
    Low,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeView {
    pub width_percent: f64,
    pub slider_value: f64,
    pub icon: VolumeIcon,
}

impl VolumeView {
    pub fn render(volume: f64, muted: bool) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        let icon = if muted || volume == 0.0 {
            VolumeIcon::Muted
        } else if volume < 0.5 {
            VolumeIcon::Low
        } else {
            VolumeIcon::Full
        };
        let slider_value = if muted { 0.0 } else { volume };
        Self {
            width_percent: slider_value * 100.0,
            slider_value,
            icon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_tiers() {
        assert_eq!(VolumeView::render(0.0, false).icon, VolumeIcon::Muted);
        assert_eq!(VolumeView::render(0.8, true).icon, VolumeIcon::Muted);
        assert_eq!(VolumeView::render(0.3, false).icon, VolumeIcon::Low);
        assert_eq!(VolumeView::render(0.5, false).icon, VolumeIcon::Full);
    }

    #[test]
    fn muted_collapses_width() {
        assert_eq!(VolumeView::render(0.8, true).width_percent, 0.0);
        assert_eq!(VolumeView::render(0.25, false).width_percent, 25.0);
    }
}
