//! Application configuration loaded once at startup.
//!
//! Every setting comes from an environment variable (after `.env.local` and
//! `.env` are loaded) and falls back to a demo-friendly default. Values are
//! validated here so that a bad setting aborts the process before playback
//! starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use macrosim_domain::TimeScale;

/// Default OpenAI-compatible endpoint (local Ollama).
pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434";

/// Default narrative model.
pub const DEFAULT_LLM_MODEL: &str = "llama3.2";

const PLACEHOLDER_MARKERS: [&str; 3] = ["your_", "_here", "placeholder"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable '{key}' appears to contain a placeholder value")]
    Placeholder { key: String },
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Which narrative generator the run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeBackend {
    /// OpenAI-compatible chat completion endpoint.
    Llm,
    /// Deterministic offline text built from the same context.
    Template,
}

impl FromStr for NarrativeBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" | "openai" | "ollama" => Ok(NarrativeBackend::Llm),
            "template" | "offline" => Ok(NarrativeBackend::Template),
            other => Err(format!("expected 'llm' or 'template', got '{other}'")),
        }
    }
}

/// Where the scenario lives during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("expected 'memory' or 'sqlite', got '{other}'")),
        }
    }
}

/// Narrative generation knobs.
#[derive(Clone, PartialEq)]
pub struct NarrativeConfig {
    pub backend: NarrativeBackend,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Length phrase used in prompts, e.g. "300-400"
    pub target_words: String,
    pub pre_release: bool,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
}

impl fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("backend", &self.backend)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("target_words", &self.target_words)
            .field("pre_release", &self.pre_release)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            backend: NarrativeBackend::Template,
            max_tokens: 600,
            temperature: 0.7,
            target_words: "300-400".to_string(),
            pre_release: true,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub time_scale: TimeScale,
    /// Scenario bound in simulated days from the first item.
    pub max_days: Option<f64>,
    /// Fire items back to back, ignoring the time scale.
    pub fast_forward: bool,
    pub narrative: NarrativeConfig,
    pub store: StoreBackend,
    pub sqlite_path: PathBuf,
    pub scenario_path: PathBuf,
    pub terminal_colors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            time_scale: TimeScale::default(),
            max_days: None,
            fast_forward: false,
            narrative: NarrativeConfig::default(),
            store: StoreBackend::Memory,
            sqlite_path: PathBuf::from("./data/macrosim.db"),
            scenario_path: PathBuf::from("demos/scenario.json"),
            terminal_colors: true,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset and blank values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Result<Option<String>, ConfigError> {
            match lookup(key).map(|v| v.trim().to_string()) {
                None => Ok(None),
                Some(v) if v.is_empty() => Ok(None),
                Some(v) => {
                    let lowered = v.to_ascii_lowercase();
                    if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
                        return Err(ConfigError::Placeholder {
                            key: key.to_string(),
                        });
                    }
                    Ok(Some(v))
                }
            }
        };

        let defaults = AppConfig::default();

        let time_scale = match get("DEMO_DAY_DURATION")? {
            Some(raw) => {
                let seconds: f64 = parse_value("DEMO_DAY_DURATION", &raw)?;
                TimeScale::new(seconds)
                    .map_err(|e| ConfigError::invalid("DEMO_DAY_DURATION", &raw, e))?
            }
            None => defaults.time_scale,
        };

        let max_days = match get("SCENARIO_MAX_DAYS")? {
            Some(raw) => {
                let days: f64 = parse_value("SCENARIO_MAX_DAYS", &raw)?;
                if !days.is_finite() || days < 0.0 {
                    return Err(ConfigError::invalid(
                        "SCENARIO_MAX_DAYS",
                        &raw,
                        "must be a non-negative number of days",
                    ));
                }
                Some(days)
            }
            None => None,
        };

        let fast_forward = match get("FAST_FORWARD")? {
            Some(raw) => parse_bool("FAST_FORWARD", &raw)?,
            None => defaults.fast_forward,
        };

        let mut narrative = defaults.narrative;
        if let Some(raw) = get("NARRATIVE_BACKEND")? {
            narrative.backend = raw
                .parse()
                .map_err(|e: String| ConfigError::invalid("NARRATIVE_BACKEND", &raw, e))?;
        }
        if let Some(raw) = get("NARRATIVE_MAX_TOKENS")? {
            let tokens: u32 = parse_value("NARRATIVE_MAX_TOKENS", &raw)?;
            if tokens == 0 {
                return Err(ConfigError::invalid(
                    "NARRATIVE_MAX_TOKENS",
                    &raw,
                    "must be positive",
                ));
            }
            narrative.max_tokens = tokens;
        }
        if let Some(raw) = get("NARRATIVE_TEMPERATURE")? {
            let temperature: f32 = parse_value("NARRATIVE_TEMPERATURE", &raw)?;
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::invalid(
                    "NARRATIVE_TEMPERATURE",
                    &raw,
                    "must be between 0.0 and 2.0",
                ));
            }
            narrative.temperature = temperature;
        }
        if let Some(raw) = get("NARRATIVE_TARGET_WORDS")? {
            narrative.target_words = raw;
        }
        if let Some(raw) = get("PRE_RELEASE_NARRATIVES")? {
            narrative.pre_release = parse_bool("PRE_RELEASE_NARRATIVES", &raw)?;
        }
        if let Some(raw) = get("LLM_BASE_URL")? {
            if !(raw.starts_with("http://") || raw.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    "LLM_BASE_URL",
                    &raw,
                    "must start with 'http://' or 'https://'",
                ));
            }
            narrative.llm_base_url = raw;
        }
        if let Some(raw) = get("LLM_MODEL")? {
            narrative.llm_model = raw;
        }
        narrative.llm_api_key = get("LLM_API_KEY")?;

        let store = match get("STORE_BACKEND")? {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| ConfigError::invalid("STORE_BACKEND", &raw, e))?,
            None => defaults.store,
        };

        let terminal_colors = match get("TERMINAL_COLORS")? {
            Some(raw) => parse_bool("TERMINAL_COLORS", &raw)?,
            None => lookup("NO_COLOR").is_none(),
        };

        Ok(Self {
            time_scale,
            max_days,
            fast_forward,
            narrative,
            store,
            sqlite_path: get("SQLITE_PATH")?
                .map(PathBuf::from)
                .unwrap_or(defaults.sqlite_path),
            scenario_path: get("SCENARIO_PATH")?
                .map(PathBuf::from)
                .unwrap_or(defaults.scenario_path),
            terminal_colors,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
    }
}

/// Load `.env.local` then `.env` from the repository root. Existing variables win.
pub fn load_dotenv_from_repo_root() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
