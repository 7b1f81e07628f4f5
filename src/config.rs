use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const ALTERNATE_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DATA_DIR: &str = "nutribridge-data";

/// Placeholder key that explicitly selects demo mode.
pub const DEMO_API_KEY: &str = "demo-mode";

const ENV_API_KEY: &str = "NUTRIBRIDGE_GEMINI_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
const ENV_MODEL: &str = "NUTRIBRIDGE_GEMINI_MODEL";
const ENV_ALTERNATE_MODEL: &str = "NUTRIBRIDGE_GEMINI_ALTERNATE_MODEL";
const ENV_BASE_URL: &str = "NUTRIBRIDGE_GEMINI_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "NUTRIBRIDGE_GEMINI_TIMEOUT_SECS";
const ENV_DATA_DIR: &str = "NUTRIBRIDGE_DATA_DIR";

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    /// `None` runs the advisor in demo mode.
    pub api_key: Option<String>,
    pub model: String,
    /// Tried once when the primary model is not found.
    pub alternate_model: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            alternate_model: Some(ALTERNATE_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        if config.is_demo() {
            info!("no generative API key configured, tips run in demo mode");
        } else {
            info!(model = %config.model, "generative tips enabled");
        }
        config
    }

    /// Build from an arbitrary variable source, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = non_empty(ENV_API_KEY)
            .or_else(|| non_empty(ENV_API_KEY_FALLBACK))
            .filter(|key| key != DEMO_API_KEY);

        Self {
            api_key,
            model: non_empty(ENV_MODEL).unwrap_or(defaults.model),
            alternate_model: non_empty(ENV_ALTERNATE_MODEL).or(defaults.alternate_model),
            base_url: non_empty(ENV_BASE_URL).unwrap_or(defaults.base_url),
            timeout: non_empty(ENV_TIMEOUT_SECS)
                .and_then(|secs| secs.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.trim().is_empty() && api_key != DEMO_API_KEY).then_some(api_key);
        self
    }

    pub fn is_demo(&self) -> bool {
        self.api_key.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(ENV_DATA_DIR).filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => Self {
                data_dir: PathBuf::from(dir.trim()),
            },
            None => Self::default(),
        }
    }
}
