use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{AsRefStr, EnumString};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const LOG_FILE_NAME: &str = "slm-chat.log";

const BASE_URL_ENV: &str = "SLM_CHAT_BASE_URL";
const SHAPE_ENV: &str = "SLM_CHAT_SHAPE";

const DEFAULT_GREETING: &str = "Hello! I'm your Math Solving SLM agent. I can help with equations, calculus, or algebra. How can I help you today?";
const DEFAULT_NEW_CHAT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assistant message seeded when the program starts
    pub greeting: String,

    /// Assistant message seeded by `/new`
    pub new_chat_greeting: String,

    /// Solver backend connection
    pub transport: TransportConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Log sink and level
    pub logging: LoggingConfig,

    /// slm-chat home directory
    #[serde(skip)]
    pub home: PathBuf,
}

/// Which response contract the solver backend speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResponseShape {
    /// `{ "solution": .., "final_answer": .. }`
    #[strum(serialize = "solution_and_answer", serialize = "a")]
    SolutionAndAnswer,
    /// `{ "response": .. }`
    #[strum(serialize = "raw_response", serialize = "b")]
    RawResponse,
}

impl ResponseShape {
    /// Only the `{ "response": .. }` backend keeps conversation memory and
    /// serves `POST /reset`.
    pub fn has_remote_memory(self) -> bool {
        matches!(self, ResponseShape::RawResponse)
    }

    /// Token ceiling each backend variant was deployed with.
    pub fn default_max_tokens(self) -> u32 {
        match self {
            ResponseShape::SolutionAndAnswer => 512,
            ResponseShape::RawResponse => 2048,
        }
    }
}

/// Connection settings handed to the transport at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub base_url: String,
    /// Falls back to the shape's default when unset
    pub default_max_tokens: Option<u32>,
    pub default_temperature: f32,
    pub shape: ResponseShape,
    /// Ask the backend to wipe its memory when a chat session starts.
    /// Falls back to the shape's default when unset
    pub reset_on_start: Option<bool>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_max_tokens: None,
            default_temperature: DEFAULT_TEMPERATURE,
            shape: ResponseShape::SolutionAndAnswer,
            reset_on_start: None,
        }
    }
}

impl TransportConfig {
    pub fn max_tokens(&self) -> u32 {
        self.default_max_tokens
            .unwrap_or_else(|| self.shape.default_max_tokens())
    }

    pub fn resets_on_start(&self) -> bool {
        self.reset_on_start
            .unwrap_or_else(|| self.shape.has_remote_memory())
    }

    /// Base URL without trailing slashes, ready for joining paths.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Plain,
    Markdown,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub render_mode: RenderMode,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Markdown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Where logs go while the TUI owns the terminal. Defaults to
    /// `slm-chat.log` next to the config file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".slm-chat")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            greeting: DEFAULT_GREETING.to_string(),
            new_chat_greeting: DEFAULT_NEW_CHAT_GREETING.to_string(),
            transport: TransportConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
            home: default_home(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".slm-chat").join("config.toml"))
    }

    /// Load configuration from file and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = Self::load_file(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            Config::default()
        };

        if let Some(parent) = config_path.parent() {
            config.home = parent.to_path_buf();
        }
        if config.logging.file.is_none() {
            config.logging.file = Some(config.home.join(LOG_FILE_NAME));
        }

        Ok(config)
    }

    /// Apply `SLM_CHAT_*` overrides from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.transport.base_url = url.trim().to_string();
        }

        if let Some(shape) = lookup(SHAPE_ENV).filter(|v| !v.trim().is_empty()) {
            self.transport.shape = ResponseShape::from_str(shape.trim())
                .with_context(|| format!("Invalid {SHAPE_ENV} value: {shape}"))?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_reference_backend() {
        let config = Config::default();
        assert_eq!(config.transport.base_url, "http://localhost:8000");
        assert_eq!(config.transport.shape, ResponseShape::SolutionAndAnswer);
        assert_eq!(config.transport.max_tokens(), 512);
        assert!((config.transport.default_temperature - 0.7).abs() < f32::EPSILON);
        assert!(!config.transport.resets_on_start());
        assert!(config.greeting.contains("Math Solving SLM agent"));
    }

    #[test]
    fn raw_response_shape_defaults_to_larger_token_ceiling() {
        let transport = TransportConfig {
            shape: ResponseShape::RawResponse,
            ..TransportConfig::default()
        };
        assert_eq!(transport.max_tokens(), 2048);

        let explicit = TransportConfig {
            default_max_tokens: Some(100),
            ..transport
        };
        assert_eq!(explicit.max_tokens(), 100);
    }

    #[test]
    fn remote_reset_follows_shape_unless_set() {
        let answer_backend = TransportConfig::default();
        assert!(!answer_backend.resets_on_start());

        let memory_backend = TransportConfig {
            shape: ResponseShape::RawResponse,
            ..TransportConfig::default()
        };
        assert!(memory_backend.resets_on_start());

        let opted_out = TransportConfig {
            reset_on_start: Some(false),
            ..memory_backend
        };
        assert!(!opted_out.resets_on_start());

        let opted_in = TransportConfig {
            reset_on_start: Some(true),
            ..TransportConfig::default()
        };
        assert!(opted_in.resets_on_start());
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let transport = TransportConfig {
            base_url: "http://example.test:9000/".into(),
            ..TransportConfig::default()
        };
        assert_eq!(transport.endpoint("/solve"), "http://example.test:9000/solve");
        assert_eq!(transport.endpoint("reset"), "http://example.test:9000/reset");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.transport.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.home, dir.path());
        assert_eq!(config.logging.file, Some(dir.path().join("slm-chat.log")));
    }

    #[test]
    fn explicit_log_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nfile = \"/tmp/elsewhere.log\"\n").unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/elsewhere.log")));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[transport]\nbase_url = \"http://10.0.0.2:8000\"\nshape = \"raw_response\"\nreset_on_start = true\n",
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.transport.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.transport.shape, ResponseShape::RawResponse);
        assert!(config.transport.resets_on_start());
        assert_eq!(config.transport.max_tokens(), 2048);
        assert_eq!(config.ui.render_mode, RenderMode::Markdown);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.transport.default_max_tokens = Some(1024);
        config.ui.render_mode = RenderMode::Plain;
        config.save(&path).unwrap();

        let loaded = Config::load_file(&path).unwrap();
        assert_eq!(loaded.transport.max_tokens(), 1024);
        assert_eq!(loaded.ui.render_mode, RenderMode::Plain);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::default();
        let env = env_map(&[
            ("SLM_CHAT_BASE_URL", " http://gpu-box:8000 "),
            ("SLM_CHAT_SHAPE", "RAW_RESPONSE"),
        ]);
        config.apply_overrides(|key| env.get(key).cloned()).unwrap();
        assert_eq!(config.transport.base_url, "http://gpu-box:8000");
        assert_eq!(config.transport.shape, ResponseShape::RawResponse);
    }

    #[test]
    fn invalid_shape_override_is_an_error() {
        let mut config = Config::default();
        let env = env_map(&[("SLM_CHAT_SHAPE", "xml")]);
        let err = config
            .apply_overrides(|key| env.get(key).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("SLM_CHAT_SHAPE"));
    }
}
