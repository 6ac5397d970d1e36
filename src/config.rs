//! Application-level configuration loading: question providers and round pacing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPEEDROUND_CONFIG_PATH";
/// Environment variable holding the LLM generation API key.
const GENERATION_API_KEY_ENV: &str = "GENERATION_API_KEY";

const DEFAULT_TRIVIA_BASE_URL: &str = "https://opentdb.com";
const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_INTERMISSION_SECS: u64 = 5;
const DEFAULT_FINAL_INTERMISSION_SECS: u64 = 10;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the external trivia provider.
    pub trivia_base_url: String,
    /// Model name sent to the LLM generation endpoint.
    pub generation_model: String,
    /// API key for the generation endpoint; LLM decks are unavailable without it.
    pub generation_api_key: Option<String>,
    /// Pause between two rounds while players read the result.
    pub intermission: Duration,
    /// Extended pause after the final round, before game-over.
    pub final_intermission: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        Self {
            generation_api_key: env::var(GENERATION_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            ..config
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trivia_base_url: DEFAULT_TRIVIA_BASE_URL.into(),
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            generation_api_key: None,
            intermission: Duration::from_secs(DEFAULT_INTERMISSION_SECS),
            final_intermission: Duration::from_secs(DEFAULT_FINAL_INTERMISSION_SECS),
        }
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    trivia_base_url: Option<String>,
    generation_model: Option<String>,
    intermission_secs: Option<u64>,
    final_intermission_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            trivia_base_url: raw.trivia_base_url.unwrap_or(defaults.trivia_base_url),
            generation_model: raw.generation_model.unwrap_or(defaults.generation_model),
            generation_api_key: None,
            intermission: raw
                .intermission_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.intermission),
            final_intermission: raw
                .final_intermission_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.final_intermission),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
