//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tapdesk_core::input::GestureConfig;
use tapdesk_core::{Profile, SessionConfig, StaticProfileStore};

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connect and teardown timings.
    pub session: SessionSection,
    /// Desktop size requested from the remote host.
    pub display: DisplaySection,
    /// Touch and keyboard handling.
    pub input: InputSection,
    /// Logging.
    pub logging: LoggingSection,
    /// Saved connection profiles.
    pub profiles: Vec<Profile>,
}

/// Session timings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub connect_timeout_ms: u64,
    pub join_timeout_ms: u64,
    /// How long to wait for the first frame before reporting it.
    pub first_frame_grace_ms: u64,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Remote desktop width.
    pub width: u32,
    /// Remote desktop height.
    pub height: u32,
    /// Start with the image shrunk to 80% of the surface.
    pub reduced: bool,
}

/// Input forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSection {
    /// Forward touch and pointer events.
    pub capture_touch: bool,
    /// Forward keyboard events.
    pub capture_keyboard: bool,
    /// Longest press that still counts as a tap.
    pub tap_timeout_ms: u64,
    /// Travel, in surface pixels, that turns a press into a drag.
    pub drag_threshold_px: f32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            connect_timeout_ms: millis(defaults.connect_timeout),
            join_timeout_ms: millis(defaults.join_timeout),
            first_frame_grace_ms: millis(defaults.first_frame_grace),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            reduced: false,
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        let defaults = GestureConfig::default();
        Self {
            capture_touch: true,
            capture_keyboard: true,
            tap_timeout_ms: millis(defaults.tap_timeout),
            drag_threshold_px: defaults.drag_threshold_sq.sqrt(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Conversions ──────────────────────────────────────────────────

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            first_frame_grace: Duration::from_millis(self.first_frame_grace_ms),
        }
    }
}

impl InputSection {
    pub fn to_gesture_config(&self) -> GestureConfig {
        let threshold = self.drag_threshold_px.max(0.0);
        GestureConfig {
            drag_threshold_sq: threshold * threshold,
            tap_timeout: Duration::from_millis(self.tap_timeout_ms),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(ConfigError::Io(_)) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{e} ({}); using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Load from a TOML file, reporting every failure.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let text = Self::default().to_toml()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// The saved profiles as a store for the session layer.
    pub fn profile_store(&self) -> StaticProfileStore {
        StaticProfileStore::new(self.profiles.clone())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ClientConfig::default();
        let text = cfg.to_toml().unwrap();
        assert!(text.contains("connect_timeout_ms = 30000"));
        assert!(text.contains("first_frame_grace_ms = 3500"));
        assert!(text.contains("width"));
    }

    #[test]
    fn defaults_match_session_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.session.to_session_config(), SessionConfig::default());
        let gesture = cfg.input.to_gesture_config();
        assert_eq!(gesture.tap_timeout, Duration::from_millis(300));
        assert!((gesture.drag_threshold_sq - 36.0).abs() < 1e-3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = ClientConfig::parse(
            r#"
            [session]
            connect_timeout_ms = 5000

            [logging]
            level = "tapdesk_core=debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session.connect_timeout_ms, 5000);
        assert_eq!(cfg.session.join_timeout_ms, 1000);
        assert_eq!(cfg.display.width, 1280);
        assert_eq!(cfg.logging.level, "tapdesk_core=debug");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_are_read() {
        let cfg = ClientConfig::parse(
            r#"
            [[profiles]]
            name = "office"
            device_id = "10.0.0.5:3389"
            username = "CORP\\alice"
            password = "hunter2"

            [[profiles]]
            name = "lab"
            device_id = "lab.example.com:3390"
            username = "bob"
            display_name = "Lab box"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.profiles.len(), 2);
        assert_eq!(cfg.profiles[0].domain(), Some("CORP"));
        assert_eq!(cfg.profiles[1].label(), "Lab box");
        assert!(cfg.profiles[1].password.is_empty());
        assert_eq!(cfg.profile_store().len(), 2);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = ClientConfig::parse("[session\nconnect_timeout_ms = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("tapdesk-config-does-not-exist.toml");
        let cfg = ClientConfig::load(&path);
        assert_eq!(cfg.display.height, 800);
        assert!(matches!(
            ClientConfig::try_load(&path),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn write_default_roundtrips() {
        let path = std::env::temp_dir().join(format!(
            "tapdesk-config-{}.toml",
            std::process::id()
        ));
        ClientConfig::write_default(&path).unwrap();
        let cfg = ClientConfig::try_load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.input.tap_timeout_ms, 300);
        assert!(cfg.input.capture_touch);
    }
}
