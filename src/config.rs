//! Highlight configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides. Loaded from JSON by the `findglow` binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Border widths of the highlight box, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderWidths {
    pub inner: f64,
    pub outer: f64,
}

impl BorderWidths {
    /// Inset applied on each side of the matched range.
    pub fn total(&self) -> f64 {
        self.inner + self.outer
    }
}

impl Default for BorderWidths {
    fn default() -> Self {
        Self {
            inner: 2.0,
            outer: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Lifetime of one highlight session
    pub duration_ms: u64,
    pub border: BorderWidths,
    pub border_color: String,
    pub opacity_low: f64,
    pub opacity_high: f64,
    /// Number of opacity cycles shown across one session
    pub pulses_per_session: u32,
    /// Name of the injected keyframe animation
    pub animation_name: String,
    /// Drop trigger/query results belonging to a superseded find command
    pub discard_stale_replies: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            duration_ms: 2000,
            border: BorderWidths::default(),
            border_color: "#f5c211".to_string(),
            opacity_low: 0.2,
            opacity_high: 1.0,
            pulses_per_session: 10,
            animation_name: "findglow-pulse".to_string(),
            discard_stale_replies: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl HighlightConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded highlight config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_ms == 0 {
            return Err(ConfigError::Invalid("duration_ms must be positive".to_string()));
        }
        if self.pulses_per_session == 0 {
            return Err(ConfigError::Invalid(
                "pulses_per_session must be positive".to_string(),
            ));
        }
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.opacity_low) || !in_range(self.opacity_high) {
            return Err(ConfigError::Invalid("opacity must be within [0, 1]".to_string()));
        }
        if self.opacity_low >= self.opacity_high {
            return Err(ConfigError::Invalid(
                "opacity_low must be below opacity_high".to_string(),
            ));
        }
        if self.border.inner < 0.0 || self.border.outer < 0.0 {
            return Err(ConfigError::Invalid("border widths must not be negative".to_string()));
        }
        if self.animation_name.is_empty()
            || !self
                .animation_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "animation_name '{}' is not a valid identifier",
                self.animation_name
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Length of one opacity cycle: the session duration split into
    /// `pulses_per_session` parts.
    pub fn pulse_period(&self) -> Duration {
        self.duration() / self.pulses_per_session.max(1)
    }
}
