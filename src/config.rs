use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration, persisted as TOML under the docchat
/// home directory. The selected model is stored here so it survives
/// restarts and reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the document-QA backend
    pub server_url: String,

    /// Model used for new submissions
    pub default_model: String,

    /// Models offered by the model picker
    pub models: Vec<String>,

    /// Seconds of channel silence before a request counts as stalled
    pub stall_timeout_secs: u64,

    /// Question suggestions offered while the composer is empty
    pub canned_questions: Vec<String>,

    /// docchat home directory
    #[serde(skip)]
    pub home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".docchat");

        Config {
            server_url: "http://localhost:5000".to_string(),
            default_model: "Lama3.1".to_string(),
            models: vec![
                "Lama3.1".to_string(),
                "DeepSeek".to_string(),
                "Mistral".to_string(),
            ],
            stall_timeout_secs: 40,
            canned_questions: vec![
                "Welches Thema hat diese Bachelorarbeit?".to_string(),
                "Wer ist der HS-Betreuer dieser Bachelorarbeit?".to_string(),
                "Von wem wird diese Bachelorarbeit durchgeführt?".to_string(),
            ],
            home,
        }
    }
}

impl Config {
    /// Load configuration from `~/.docchat/config.toml`, creating the
    /// directory (and falling back to defaults) on first run.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .context("Could not find home directory")?
            .join(".docchat");
        fs::create_dir_all(&home).context("Failed to create .docchat directory")?;

        let config_path = home.join("config.toml");
        let mut config = if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = home;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create .docchat directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Persist a new model selection.
    pub fn set_model(&mut self, model: impl Into<String>) -> Result<()> {
        self.default_model = model.into();
        self.save()
    }

    /// Whether `model` is one of the configured models (case-insensitive).
    pub fn resolve_model(&self, model: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|m| m.eq_ignore_ascii_case(model))
            .map(String::as_str)
    }

    /// Path of the log file the TUI writes diagnostics to.
    pub fn log_path(&self) -> PathBuf {
        self.home.join("docchat.log")
    }

    /// Stall window as a duration.
    pub fn stall_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stall_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_observed_threshold_and_models() {
        let config = Config::default();
        assert_eq!(config.stall_timeout_secs, 40);
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.default_model, "Lama3.1");
        assert_eq!(config.canned_questions.len(), 3);
    }

    #[test]
    fn resolve_model_is_case_insensitive() {
        let config = Config::default();
        assert_eq!(config.resolve_model("deepseek"), Some("DeepSeek"));
        assert_eq!(config.resolve_model("gpt-9"), None);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server_url, config.server_url);
        assert_eq!(parsed.stall_timeout_secs, config.stall_timeout_secs);
        assert_eq!(parsed.models, config.models);
    }
}
