use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory unless `--config` says otherwise
pub const DEFAULT_CONFIG_FILE: &str = "pretender.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub typing: TypingConfig,
}

// ============================================================================
// Typing Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct TypingConfig {
    /// Pause between two replayed keystrokes
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,
    /// Pending keystrokes kept before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Spaces per tab in generated code
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            keystroke_delay_ms: default_keystroke_delay(),
            queue_capacity: default_queue_capacity(),
            tab_width: default_tab_width(),
        }
    }
}

fn default_keystroke_delay() -> u64 {
    12
}

fn default_queue_capacity() -> usize {
    256
}

fn default_tab_width() -> usize {
    4
}

// ============================================================================
// LLM Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Preset shortcuts: "gemini", "openai", "lm_studio", "ollama"
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Explicit endpoint; wins over the preset
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            base_url: String::new(),
            model: default_model(),
            api_key: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

fn default_preset() -> String {
    "gemini".into()
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}

fn preset_url(preset: &str) -> Option<&'static str> {
    match preset {
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "openai" => Some("https://api.openai.com/v1"),
        "lm_studio" => Some("http://localhost:1234/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Expand ${VAR} to environment variable values
fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!(var = var_name, "Environment variable not found");
            String::new()
        });
        result.replace_range(start..start + end + 1, &value);
    }

    result
}

impl LlmConfig {
    /// Resolve preset to base_url if needed, and expand env vars in api_key
    pub fn resolve_presets(&mut self) {
        if self.base_url.is_empty() {
            self.base_url = match preset_url(&self.preset) {
                Some(url) => url.to_string(),
                None => {
                    tracing::warn!(preset = %self.preset, "Unknown preset, using gemini");
                    preset_url("gemini").unwrap_or_default().to_string()
                }
            };
        }

        if let Some(key) = &mut self.api_key {
            *key = expand_env_vars(key);
        }
    }

    /// Configured credential, if it is non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Config {
    /// Load `path` (or the default file). A missing file gives defaults; a
    /// broken one is reported and also gives defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            let mut config = Config::default();
            config.llm.resolve_presets();
            return config;
        }

        Self::load_from(path).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Config ignored, using defaults");
            let mut config = Config::default();
            config.llm.resolve_presets();
            config
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.llm.resolve_presets();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.preset, "gemini");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.typing.keystroke_delay_ms, 12);
        assert_eq!(config.typing.queue_capacity, 256);
        assert_eq!(config.typing.tab_width, 4);
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
[llm]
preset = "ollama"
model = "qwen2.5-coder"

[typing]
keystroke_delay_ms = 40
"#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "qwen2.5-coder");
        assert_eq!(config.typing.keystroke_delay_ms, 40);
        assert_eq!(config.typing.queue_capacity, 256);
    }

    #[test]
    fn test_base_url_wins_over_preset() {
        let file = write_config("[llm]\npreset = \"openai\"\nbase_url = \"http://proxy:8080/v1\"\n");
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.llm.base_url, "http://proxy:8080/v1");
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        let mut llm = LlmConfig {
            preset: "mystery".into(),
            ..LlmConfig::default()
        };
        llm.resolve_presets();
        assert!(llm.base_url.starts_with("https://generativelanguage.googleapis.com"));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[typing\nkeystroke_delay_ms = ");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_falls_back_on_broken_file() {
        let file = write_config("typing = 5");
        let config = Config::load(Some(file.path()));
        assert_eq!(config.typing.keystroke_delay_ms, 12);
        assert!(!config.llm.base_url.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(config.llm.preset, "gemini");
    }

    #[test]
    fn test_expand_env_vars() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env_vars("${PATH}"), path);
        assert_eq!(expand_env_vars("k-${PRETENDER_TEST_UNSET_VAR}"), "k-");
        assert_eq!(expand_env_vars("no vars"), "no vars");
        assert_eq!(expand_env_vars("${unterminated"), "${unterminated");
    }

    #[test]
    fn test_api_key_blank_is_none() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.api_key(), None);
        llm.api_key = Some("  ".into());
        assert_eq!(llm.api_key(), None);
        llm.api_key = Some("secret".into());
        assert_eq!(llm.api_key(), Some("secret"));
    }
}
