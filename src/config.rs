use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::ARCHIVAL_USER_AGENT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
///
/// Everything here is process-wide and read-only. Per-run choices live in
/// [`crate::cli::Args`].
#[derive(Debug, Clone)]
pub struct Config {
    // Macros
    pub macros_file: PathBuf,

    // Output
    pub output_dir: PathBuf,

    // Dispatch
    pub handler_timeout: Duration,
    pub strip_tracking: bool,

    // External tools
    pub monolith_path: String,
    pub yt_dlp_path: String,

    // Archive services
    pub wayback_base_url: String,
    pub wayback_availability_url: String,
    pub archive_today_base_url: String,

    // HTTP
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Macros
            macros_file: PathBuf::from(env_or_default("ASAK_MACROS_FILE", "macros.ini")),

            // Output
            output_dir: PathBuf::from(env_or_default("ASAK_OUTPUT_DIR", ".")),

            // Dispatch
            handler_timeout: Duration::from_secs(parse_env_u64("ASAK_HANDLER_TIMEOUT_SECS", 600)?),
            strip_tracking: parse_env_bool("ASAK_STRIP_TRACKING", false)?,

            // External tools
            monolith_path: env_or_default("MONOLITH_PATH", "monolith"),
            yt_dlp_path: env_or_default("YT_DLP_PATH", "yt-dlp"),

            // Archive services
            wayback_base_url: env_or_default("WAYBACK_BASE_URL", "https://web.archive.org"),
            wayback_availability_url: env_or_default(
                "WAYBACK_AVAILABILITY_URL",
                "https://archive.org/wayback/available",
            ),
            archive_today_base_url: env_or_default(
                "ARCHIVE_TODAY_BASE_URL",
                "https://archive.today",
            ),

            // HTTP
            user_agent: env_or_default("ASAK_USER_AGENT", ARCHIVAL_USER_AGENT),
        })
    }

    /// Configuration with defaults and no environment lookups.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            macros_file: PathBuf::from("macros.ini"),
            output_dir: PathBuf::from("."),
            handler_timeout: Duration::from_secs(30),
            strip_tracking: false,
            monolith_path: "monolith".to_string(),
            yt_dlp_path: "yt-dlp".to_string(),
            wayback_base_url: "https://web.archive.org".to_string(),
            wayback_availability_url: "https://archive.org/wayback/available".to_string(),
            archive_today_base_url: "https://archive.today".to_string(),
            user_agent: ARCHIVAL_USER_AGENT.to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handler_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "ASAK_HANDLER_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("WAYBACK_BASE_URL", &self.wayback_base_url),
            ("WAYBACK_AVAILABILITY_URL", &self.wayback_availability_url),
            ("ARCHIVE_TODAY_BASE_URL", &self.archive_today_base_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("not a valid URL: '{value}'"),
                });
            }
        }
        if self.monolith_path.is_empty() || self.yt_dlp_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "MONOLITH_PATH/YT_DLP_PATH".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => parse_bool(name, &val),
        _ => Ok(default),
    }
}

fn parse_bool(name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseBool {
            name: name.to_string(),
            value: val.to_string(),
        }),
    }
}
