use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const MAX_CAMERA_BUFFERS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewerConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub camera: CameraSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub vsync: bool,
    #[serde(default = "default_true")]
    pub show_diagnostics: bool,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            size: default_size(),
            title: default_title(),
            vsync: true,
            show_diagnostics: true,
        }
    }
}

/// Kept as raw strings; the viewer crate owns the format and content mode
/// tables and reports unknown names itself.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DisplaySection {
    #[serde(default)]
    pub content_mode: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CameraSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_buffers")]
    pub buffers: usize,
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_interval: Duration,
    #[serde(default = "default_true")]
    pub zero_copy: bool,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            enabled: false,
            buffers: default_buffers(),
            frame_interval: default_frame_interval(),
            zero_copy: true,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            display: DisplaySection::default(),
            camera: CameraSection::default(),
        }
    }
}

fn default_size() -> String {
    "1280x720".to_string()
}

fn default_title() -> String {
    "texview".to_string()
}

fn default_true() -> bool {
    true
}

fn default_buffers() -> usize {
    3
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(33)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `WIDTHxHEIGHT`, both non-zero.
pub fn parse_size(raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::Invalid(format!("size '{raw}' must look like 1280x720"));
    let (width, height) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

impl ViewerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewerConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn window_size(&self) -> Result<(u32, u32), ConfigError> {
        parse_size(&self.window.size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        self.window_size()?;

        if self.window.title.trim().is_empty() {
            return Err(ConfigError::Invalid("window.title may not be empty".into()));
        }

        if !(1..=MAX_CAMERA_BUFFERS).contains(&self.camera.buffers) {
            return Err(ConfigError::Invalid(format!(
                "camera.buffers must be between 1 and {MAX_CAMERA_BUFFERS}, got {}",
                self.camera.buffers
            )));
        }

        if self.camera.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "camera.frame_interval must be greater than zero".into(),
            ));
        }

        if let Some(format) = &self.display.format {
            if format.trim().is_empty() {
                return Err(ConfigError::Invalid("display.format may not be empty".into()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
size = "1920x1080"
title = "Capture preview"
vsync = false

[display]
content_mode = "aspect-fill"
format = "420v"

[camera]
enabled = true
buffers = 2
frame_interval = "16ms"
"#;

    #[test]
    fn parses_sample_config() {
        let config = ViewerConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window_size().unwrap(), (1920, 1080));
        assert_eq!(config.window.title, "Capture preview");
        assert!(!config.window.vsync);
        assert!(config.window.show_diagnostics);
        assert_eq!(config.display.content_mode.as_deref(), Some("aspect-fill"));
        assert_eq!(config.display.format.as_deref(), Some("420v"));
        assert!(config.camera.enabled);
        assert_eq!(config.camera.buffers, 2);
        assert_eq!(config.camera.frame_interval, Duration::from_millis(16));
        assert!(config.camera.zero_copy);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ViewerConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.window_size().unwrap(), (1280, 720));
        assert_eq!(config.camera.frame_interval, Duration::from_millis(33));
    }

    #[test]
    fn interval_accepts_plain_seconds() {
        let config = ViewerConfig::from_toml_str(
            r#"
version = 1

[camera]
frame_interval = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.camera.frame_interval, Duration::from_millis(500));
    }

    #[test]
    fn rejects_out_of_range_buffers() {
        for buffers in [0, 9] {
            let input = format!("version = 1\n[camera]\nbuffers = {buffers}\n");
            let err = ViewerConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{buffers}");
        }
    }

    #[test]
    fn rejects_zero_interval() {
        let err = ViewerConfig::from_toml_str("version = 1\n[camera]\nframe_interval = \"0s\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_version_and_bad_size() {
        assert!(matches!(
            ViewerConfig::from_toml_str("version = 2").unwrap_err(),
            ConfigError::Invalid(_)
        ));
        assert!(matches!(
            ViewerConfig::from_toml_str("version = 1\n[window]\nsize = \"wide\"\n").unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ViewerConfig::from_toml_str("version = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("640x480").unwrap(), (640, 480));
        assert_eq!(parse_size(" 800 X 600 ").unwrap(), (800, 600));
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("640").is_err());
    }
}
