use crate::error::{AppError, AppResult};
use crate::models::Track;
use crate::session::{SessionOptions, SessionSettings};
use crate::source::{DirectResolver, DriveResolver, SourceResolver};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "DRIVEPLAYER_API_KEY";

/// How playlist identifiers are turned into URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Identifiers are Drive file ids.
    Drive,
    /// Identifiers are already playable URLs.
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_source_mode")]
    pub source_mode: SourceMode,
    #[serde(default = "default_playlist")]
    pub playlist: Vec<Track>,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_retry_settle_ms")]
    pub retry_settle_ms: u64,
    #[serde(default)]
    pub stall_timeout_ms: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_source_mode() -> SourceMode {
    SourceMode::Drive
}

fn default_playlist() -> Vec<Track> {
    vec![
        Track::new("1ggAUirIR71vPX0_0DHHOg9rrYsdTuAYW", "Canción 1", "Google Drive Audio"),
        Track::new("1xhgBc2F6S5G1gN7-5-AiqBmx4ZQ52Ex8", "Canción 2", "Google Drive Audio"),
    ]
}

fn default_volume() -> f64 {
    1.0
}

fn default_retry_settle_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("driveplayer/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            source_mode: default_source_mode(),
            playlist: default_playlist(),
            volume: default_volume(),
            muted: false,
            retry_settle_ms: default_retry_settle_ms(),
            stall_timeout_ms: None,
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".driveplayer"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads the user config and applies the API key from the environment.
    pub fn load() -> AppResult<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_api_key_override(std::env::var(API_KEY_ENV).ok()))
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.playlist.is_empty() {
            return Err(AppError::EmptyPlaylist);
        }
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(AppError::Config(format!(
                "volume must be between 0 and 1, got {}",
                self.volume
            )));
        }
        if self.source_mode == SourceMode::Direct {
            for track in &self.playlist {
                let url = url::Url::parse(&track.id).map_err(|e| {
                    AppError::Config(format!("track {:?} is not a valid URL: {}", track.id, e))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(AppError::Config(format!(
                        "track {:?} must use http or https",
                        track.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// The configured key, ignoring blank values.
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn resolver(&self) -> Box<dyn SourceResolver + Send + Sync> {
        match self.source_mode {
            SourceMode::Drive => Box::new(DriveResolver),
            SourceMode::Direct => Box::new(DirectResolver),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            retry_settle: Duration::from_millis(self.retry_settle_ms),
            stall_timeout: self
                .stall_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            credential: self.credential(),
            settings: self.session_settings(),
            volume: self.volume,
            muted: self.muted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("driveplayer-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"apiKey": "abcdefgh"}"#).unwrap();
        assert_eq!(config.source_mode, SourceMode::Drive);
        assert_eq!(config.playlist.len(), 2);
        assert_eq!(config.retry_settle_ms, 500);
        assert_eq!(config.stall_timeout_ms, None);
        assert_eq!(config.credential().as_deref(), Some("abcdefgh"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip.json");
        let mut config = AppConfig::default();
        config.muted = true;
        config.stall_timeout_ms = Some(8000);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!(loaded.muted);
        assert_eq!(
            loaded.session_settings().stall_timeout,
            Some(Duration::from_secs(8))
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = AppConfig::load_from(&temp_path("does-not-exist.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut config = AppConfig::default();
        config.playlist.clear();
        assert!(matches!(config.validate(), Err(AppError::EmptyPlaylist)));

        let mut config = AppConfig::default();
        config.volume = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.source_mode = SourceMode::Direct;
        assert!(config.validate().is_err());
        config.playlist = vec![Track::new("https://example.com/a.mp3", "A", "B")];
        assert!(config.validate().is_ok());
        config.playlist = vec![Track::new("ftp://example.com/a.mp3", "A", "B")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_key_overrides_file_key() {
        let config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        let config = config.with_api_key_override(Some("from-env".into()));
        assert_eq!(config.credential().as_deref(), Some("from-env"));

        let config = config.with_api_key_override(Some("  ".into()));
        assert_eq!(config.credential().as_deref(), Some("from-env"));
    }

    #[test]
    fn resolver_follows_source_mode() {
        let mut config = AppConfig::default();
        assert_eq!(config.resolver().resolve("abc", None).len(), 2);

        config.source_mode = SourceMode::Direct;
        assert_eq!(
            config.resolver().resolve("https://example.com/a.mp3", None),
            vec!["https://example.com/a.mp3".to_string()]
        );
    }

    #[test]
    fn zero_stall_timeout_disables_it() {
        let config = AppConfig {
            stall_timeout_ms: Some(0),
            retry_settle_ms: 250,
            ..AppConfig::default()
        };
        let settings = config.session_settings();
        assert_eq!(settings.stall_timeout, None);
        assert_eq!(settings.retry_settle, Duration::from_millis(250));
    }
}
