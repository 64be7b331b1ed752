//! Environment Configuration Loader
//!
//! Loads environment variables from a dotenv-style file and builds the
//! application configuration from the process environment.
//!
//! ## Usage
//!
//! Call `load_environment()` early in main() before reading any config:
//!
//! ```no_run
//! use pb_core::config::{load_environment, AppConfig};
//!
//! load_environment();
//! let config = AppConfig::from_env().expect("valid configuration");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Alternative paths to check (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &["/etc/ping-buddy/environment", ".env"];

/// Variable naming a custom environment file
pub const ENV_FILE_VAR: &str = "PING_BUDDY_ENV_FILE";

pub const DEFAULT_RESULTS_PATH: &str = "ping_results.json";
pub const DEFAULT_PING_PROGRAM: &str = "ping";
pub const DEFAULT_PING_COUNT: u32 = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-1106-preview";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Load environment variables from the canonical configuration file.
///
/// This function:
/// 1. Checks `$PING_BUDDY_ENV_FILE` if set
/// 2. Then `/etc/ping-buddy/environment` (system-wide)
/// 3. Falls back to `.env` in current directory (development)
/// 4. Does NOT override existing environment variables
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var(ENV_FILE_VAR) {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Try to load an environment file from the given path.
pub fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for (key, value) in content.lines().filter_map(parse_env_line) {
                if std::env::var(&key).is_err() {
                    std::env::set_var(&key, &value);
                    loaded_count += 1;
                    debug!("Loaded: {}={}", key, redact(&key, &value));
                } else {
                    skipped_count += 1;
                    debug!("Skipped (already set): {}", key);
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single environment line into key-value pair.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);

    // Handle: KEY=VALUE, KEY="VALUE", KEY='VALUE'
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

fn parse_bool(value: Option<&str>) -> Option<bool> {
    value.map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Where the result envelope is written
    pub results_path: PathBuf,
    /// Probe executable
    pub ping_program: String,
    /// Packets sent per probe
    pub ping_count: u32,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    /// Rephrase follow-up questions into standalone ones before retrieval
    pub condense_question: bool,
    pub openai_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            ping_program: DEFAULT_PING_PROGRAM.to_string(),
            ping_count: DEFAULT_PING_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: 0.0,
            condense_question: true,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let config = Self {
            results_path: get("PING_BUDDY_RESULTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_path),
            ping_program: get("PING_BUDDY_PING_PROGRAM").unwrap_or(defaults.ping_program),
            ping_count: parse_num(get("PING_BUDDY_PING_COUNT"), "PING_BUDDY_PING_COUNT")?
                .unwrap_or(defaults.ping_count),
            chunk_size: parse_num(get("PING_BUDDY_CHUNK_SIZE"), "PING_BUDDY_CHUNK_SIZE")?
                .unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_num(get("PING_BUDDY_CHUNK_OVERLAP"), "PING_BUDDY_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chunk_overlap),
            top_k: parse_num(get("PING_BUDDY_TOP_K"), "PING_BUDDY_TOP_K")?
                .unwrap_or(defaults.top_k),
            chat_model: get("PING_BUDDY_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: get("PING_BUDDY_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            temperature: parse_num(get("PING_BUDDY_TEMPERATURE"), "PING_BUDDY_TEMPERATURE")?
                .unwrap_or(defaults.temperature),
            condense_question: parse_bool(get("PING_BUDDY_CONDENSE_QUESTION").as_deref())
                .unwrap_or(defaults.condense_question),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.ping_count == 0 {
            return Err(Error::config("ping count must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(Error::config("chunk size must be at least 1"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(Error::config("top-k must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature {} is outside 0..=2",
                self.temperature
            )));
        }
        if self.ping_program.trim().is_empty() {
            return Err(Error::config("ping program must not be empty"));
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(value: Option<String>, key: &str) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("{} has invalid value '{}'", key, raw))),
    }
}
