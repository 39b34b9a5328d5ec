use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::shared::constants::{
    ASSUMED_FPS, DEFAULT_ALERT_OPACITY, DEFAULT_ALERT_SIZE, DEFAULT_DEBOUNCE_SECS,
    DEFAULT_DETECTION_DELAY_FRAMES, DEFAULT_FACE_THRESHOLD,
};

/// One year. Keeps every configured time representable as a `Duration`.
const MAX_CONFIG_SECS: f64 = 31_536_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("face threshold must be at least 1, got {0}")]
    FaceThreshold(u32),
    #[error("detection delay must be at least 1 frame, got {0}")]
    DetectionDelay(u32),
    #[error("{field} must be between 0 and 31536000 seconds, got {value}")]
    Seconds { field: &'static str, value: f64 },
    #[error("alert duration must be positive when set, got {0}")]
    AlertDuration(f64),
    #[error("alert opacity must be between 0.0 and 1.0, got {0}")]
    Opacity(f32),
    #[error("alert size must be non-zero, got {0}x{1}")]
    Size(u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPosition {
    Center,
    Top,
    Bottom,
}

impl std::fmt::Display for AlertPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertPosition::Center => write!(f, "center"),
            AlertPosition::Top => write!(f, "top"),
            AlertPosition::Bottom => write!(f, "bottom"),
        }
    }
}

impl std::str::FromStr for AlertPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "center" => Ok(AlertPosition::Center),
            "top" => Ok(AlertPosition::Top),
            "bottom" => Ok(AlertPosition::Bottom),
            other => Err(format!(
                "alert position must be one of: center, top, bottom, got '{other}'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl AlertColor {
    pub const RED: AlertColor = AlertColor { r: 255, g: 0, b: 0 };

    /// Settings documents store colors in OpenCV channel order.
    pub fn from_bgr([b, g, r]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl Default for AlertColor {
    fn default() -> Self {
        Self::RED
    }
}

/// How the alert looks. The engine never interprets these values; the
/// presenter reads them from the current config when it shows an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPresentation {
    pub color: AlertColor,
    pub opacity: f32,
    pub size: (u32, u32),
    pub position: AlertPosition,
    pub enable_animations: bool,
}

impl Default for AlertPresentation {
    fn default() -> Self {
        Self {
            color: AlertColor::default(),
            opacity: DEFAULT_ALERT_OPACITY,
            size: DEFAULT_ALERT_SIZE,
            position: AlertPosition::Center,
            enable_animations: true,
        }
    }
}

/// Parameters of the decision engine.
///
/// Times are in seconds. `debounce_time` is carried for the caller, which
/// enforces it between detector runs; the engine itself only uses
/// `face_threshold`, `detection_delay` and `alert_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub face_threshold: u32,
    pub debounce_time: f64,
    pub alert_duration: Option<f64>,
    /// Consecutive agreeing frames required before the alert state flips.
    pub detection_delay: u32,
    pub presentation: AlertPresentation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            face_threshold: DEFAULT_FACE_THRESHOLD,
            debounce_time: DEFAULT_DEBOUNCE_SECS,
            alert_duration: None,
            detection_delay: DEFAULT_DETECTION_DELAY_FRAMES,
            presentation: AlertPresentation::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.face_threshold < 1 {
            return Err(ConfigError::FaceThreshold(self.face_threshold));
        }
        if self.detection_delay < 1 {
            return Err(ConfigError::DetectionDelay(self.detection_delay));
        }
        check_seconds("debounce time", self.debounce_time)?;
        if let Some(duration) = self.alert_duration {
            check_seconds("alert duration", duration)?;
            if duration == 0.0 {
                return Err(ConfigError::AlertDuration(duration));
            }
        }
        let opacity = self.presentation.opacity;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ConfigError::Opacity(opacity));
        }
        let (w, h) = self.presentation.size;
        if w == 0 || h == 0 {
            return Err(ConfigError::Size(w, h));
        }
        Ok(())
    }

    pub fn alert_duration(&self) -> Option<Duration> {
        self.alert_duration.map(Duration::from_secs_f64)
    }

    /// Returns a copy of this config with `patch` applied, or the first
    /// validation error of the merged result.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<EngineConfig, ConfigError> {
        let mut next = self.clone();

        if let Some(threshold) = patch.face_threshold {
            next.face_threshold = threshold;
        }
        if let Some(debounce) = patch.debounce_time {
            next.debounce_time = debounce;
        }
        if let Some(duration) = patch.alert_duration {
            next.alert_duration = duration;
        }
        if let Some(secs) = patch.detection_delay {
            next.detection_delay = delay_secs_to_frames(secs)?;
        }
        // An explicit frame count wins over a delay given in seconds.
        if let Some(frames) = patch.detection_delay_frames {
            next.detection_delay = frames;
        }

        let presentation = &mut next.presentation;
        if let Some(color) = patch.alert_color {
            presentation.color = color;
        }
        if let Some(opacity) = patch.alert_opacity {
            presentation.opacity = opacity;
        }
        if let Some(size) = patch.alert_size {
            presentation.size = size;
        }
        if let Some(position) = patch.alert_position {
            presentation.position = position;
        }
        if let Some(animations) = patch.enable_animations {
            presentation.enable_animations = animations;
        }

        next.validate()?;
        Ok(next)
    }
}

/// Partial settings update. Fields left as `None` keep their current value.
///
/// Deserializes from the settings document the desktop app saves. Keys the
/// engine has no use for (detector type, alert text and so on) are ignored.
/// That document gives `detection_delay` in seconds and `alert_color` as a
/// `[b, g, r]` triple. `detection_delay_frames` is an extra key for callers
/// that count frames directly.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub face_threshold: Option<u32>,
    pub debounce_time: Option<f64>,
    /// `Some(None)` switches auto-dismiss off.
    #[serde(deserialize_with = "explicit_null")]
    pub alert_duration: Option<Option<f64>>,
    /// Seconds, converted with [`delay_secs_to_frames`].
    pub detection_delay: Option<f64>,
    pub detection_delay_frames: Option<u32>,
    #[serde(deserialize_with = "bgr_color")]
    pub alert_color: Option<AlertColor>,
    pub alert_opacity: Option<f32>,
    pub alert_size: Option<(u32, u32)>,
    pub alert_position: Option<AlertPosition>,
    pub enable_animations: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

/// Converts a confirmation delay in seconds to a frame count at
/// [`ASSUMED_FPS`], never less than one frame.
pub fn delay_secs_to_frames(secs: f64) -> Result<u32, ConfigError> {
    check_seconds("detection delay", secs)?;
    let frames = (secs * ASSUMED_FPS).floor();
    Ok((frames.min(u32::MAX as f64) as u32).max(1))
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=MAX_CONFIG_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Seconds { field, value })
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn bgr_color<'de, D>(deserializer: D) -> Result<Option<AlertColor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<[u8; 3]>::deserialize(deserializer)?.map(AlertColor::from_bgr))
}
