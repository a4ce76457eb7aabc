use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn config_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lelamp")
        .join("config.toml")
}

fn default_recordings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lelamp")
        .join("recordings")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "gemini" | "openai"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_true")]
    pub auto_react: bool,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    /// Overrides the provider's API key variable (GOOGLE_API_KEY / OPENAI_API_KEY).
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-emotion candidate overrides, e.g. `excited = ["luxo_excited"]`.
    #[serde(default)]
    pub recordings: BTreeMap<String, Vec<String>>,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_min_confidence() -> f32 {
    0.7
}

fn default_cooldown_seconds() -> f64 {
    2.0
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: String::new(),
            auto_react: true,
            min_confidence: default_min_confidence(),
            cooldown_seconds: default_cooldown_seconds(),
            api_key_env: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            recordings: BTreeMap::new(),
        }
    }
}

impl EmotionConfig {
    /// Effective model name based on provider defaults
    pub fn effective_model(&self) -> &str {
        if !self.model.is_empty() {
            return &self.model;
        }
        match self.provider.as_str() {
            "openai" => "gpt-4o-mini",
            _ => "gemini-1.5-flash",
        }
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_var(&self) -> &str {
        if !self.api_key_env.is_empty() {
            return &self.api_key_env;
        }
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "GOOGLE_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// false = headless, no motor hardware attached.
    #[serde(default = "default_true")]
    pub motors_enabled: bool,
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    #[serde(default)]
    pub emotion: EmotionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motors_enabled: true,
            recordings_dir: default_recordings_dir(),
            emotion: EmotionConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&text)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
