//! Configuration file parser for ~/.config/pageturn/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and logged as warnings.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::theme::ThemeVariant;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// `Debug` masks `jina_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// "light" or "dark". Unknown names fall back to light.
    pub theme: String,

    /// Font size step for the reader. 0 = default body styling.
    pub font_size: u32,

    /// Strip `<img>` tags from entry bodies before rendering.
    pub disable_pictures: bool,

    /// Include read entries when building the navigation sequence.
    pub show_read: bool,

    /// Mark entries read when they are displayed.
    pub mark_read_on_open: bool,

    /// Minimum interval between job-status checks while a full-text fetch
    /// is pending, in milliseconds.
    pub watch_interval_ms: u64,

    /// chrono format strings for the reader subtitle and drawer state line.
    pub date_format: String,
    pub time_format: String,

    /// Jina.ai API key (alternative to JINA_API_KEY env var).
    /// Env var takes precedence over config file.
    pub jina_api_key: Option<String>,

    /// Override for the reader proxy base URL. HTTPS required except on
    /// localhost.
    pub mobilizer_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            font_size: 0,
            disable_pictures: false,
            show_read: true,
            mark_read_on_open: true,
            watch_interval_ms: 2000,
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M".to_string(),
            jina_api_key: None,
            mobilizer_base_url: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("theme", &self.theme)
            .field("font_size", &self.font_size)
            .field("disable_pictures", &self.disable_pictures)
            .field("show_read", &self.show_read)
            .field("mark_read_on_open", &self.mark_read_on_open)
            .field("watch_interval_ms", &self.watch_interval_ms)
            .field("date_format", &self.date_format)
            .field("time_format", &self.time_format)
            .field(
                "jina_api_key",
                &self.jina_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("mobilizer_base_url", &self.mobilizer_base_url)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "theme",
        "font_size",
        "disable_pictures",
        "show_read",
        "mark_read_on_open",
        "watch_interval_ms",
        "date_format",
        "time_format",
        "jina_api_key",
        "mobilizer_base_url",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), theme = %config.theme, "Loaded configuration");
        Ok(config)
    }

    /// Resolved theme variant; unknown names fall back to light.
    pub fn theme_variant(&self) -> ThemeVariant {
        ThemeVariant::from_str_name(&self.theme).unwrap_or_else(|| {
            tracing::warn!(theme = %self.theme, "Unknown theme, using light");
            ThemeVariant::Light
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
