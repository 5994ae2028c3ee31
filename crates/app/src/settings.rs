use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cardgen_core::{CardConfig, ConfigError};
use cardgen_refine::{OpenAiCompatBackend, RefineError, TextRefiner, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint root; the public API when unset.
    pub base_url: Option<String>,
    pub model: String,
    /// Cards refined at once.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for RefinerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

impl RefinerSettings {
    /// The refiner is only live when there is somewhere to send requests:
    /// an API key, or an explicit endpoint such as a local server.
    pub fn is_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.enabled && (set(&self.api_key) || set(&self.base_url))
    }

    pub fn build(&self) -> Result<TextRefiner, RefineError> {
        if !self.is_configured() {
            return Ok(TextRefiner::disabled());
        }
        let backend = OpenAiCompatBackend::new(
            self.base_url.as_deref(),
            self.api_key.clone(),
            Duration::from_secs(self.timeout_secs.max(1)),
        )?;
        Ok(TextRefiner::new(Arc::new(backend), self.model.clone()))
    }
}

/// Everything read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extraction: CardConfig,
    pub refiner: RefinerSettings,
}

impl Settings {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(toml_content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;
        if self.refiner.concurrency == 0 {
            return Err(ConfigError::Invalid("refiner concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// `<platform config dir>/settings.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cardgen", "Cardgen")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
