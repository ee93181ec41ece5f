//! Configuration management for promptfs
//!
//! Reads settings from `~/.config/promptfs/config.toml` (or an explicit path),
//! then applies environment overrides. A missing credential is not an error:
//! it simply disables prompt translation.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "PROMPTFS_API_KEY";
pub const TOGETHER_API_KEY_ENV: &str = "TOGETHER_API_KEY";
pub const WORKSPACES_DIR_ENV: &str = "PROMPTFS_WORKSPACES_DIR";
pub const MODEL_ENV: &str = "PROMPTFS_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent directory of every workspace tree
    pub workspaces_dir: PathBuf,
    pub llm: LlmSettings,
    pub retry: RetrySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspaces_dir: PathBuf::from("workspaces"),
            llm: LlmSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-attempt bound on a model call
    pub timeout_secs: u64,
    /// Never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.together.xyz/v1/chat/completions".to_string(),
            model: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            multiplier: 2,
            max_delay_ms: 10_000,
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("promptfs"))
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load config from `explicit` (or the default location), then apply the
    /// process environment. Falls back to defaults when nothing is readable.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = explicit
            .map(Path::to_path_buf)
            .or_else(Self::config_path)
            .map(|path| Self::load_file(&path))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    "Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                    err
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV).or_else(|| non_empty(TOGETHER_API_KEY_ENV)) {
            self.llm.api_key = Some(key);
        }
        if let Some(dir) = non_empty(WORKSPACES_DIR_ENV) {
            self.workspaces_dir = PathBuf::from(dir);
        }
        if let Some(model) = non_empty(MODEL_ENV) {
            self.llm.model = model;
        }
    }

    /// Save config to `path`, without the credential.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        write_config_atomic(path, &content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/promptfs/config.toml".to_string())
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let corrupt_path = path.with_extension(format!("toml.corrupt-{}", stamp));
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::debug!("Failed to set temp config file permissions: {}", e);
        }
    }

    file.write_all(content.as_bytes())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.workspaces_dir, PathBuf::from("workspaces"));
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.llm.has_api_key());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "workspaces_dir = \"/srv/ws\"\n[llm]\ntemperature = 0.2\n",
        )
        .unwrap();

        let config = Config::load_file(&path);
        assert_eq!(config.workspaces_dir, PathBuf::from("/srv/ws"));
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 512);
    }

    #[test]
    fn test_corrupt_file_is_preserved_and_defaults_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "workspaces_dir = [[[").unwrap();

        let config = Config::load_file(&path);
        assert_eq!(config, Config::default());
        assert!(!path.exists());
        let preserved = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("corrupt"));
        assert!(preserved);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (TOGETHER_API_KEY_ENV, "tok-123"),
            (WORKSPACES_DIR_ENV, "/tmp/ws"),
            (MODEL_ENV, "  "),
        ]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("tok-123"));
        assert_eq!(config.workspaces_dir, PathBuf::from("/tmp/ws"));
        assert_eq!(config.llm.model, LlmSettings::default().model);
    }

    #[test]
    fn test_primary_key_env_wins() {
        let env: HashMap<&str, &str> =
            HashMap::from([(API_KEY_ENV, "primary"), (TOGETHER_API_KEY_ENV, "fallback")]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_save_omits_api_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.llm.api_key = Some("secret".into());

        config.save(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("secret"));

        let reloaded = Config::load_file(&path);
        assert_eq!(reloaded.llm.api_key, None);
        assert_eq!(reloaded.llm.model, config.llm.model);
        assert!(!reloaded.llm.has_api_key());
    }

    #[test]
    fn test_config_location_names_the_toml_file() {
        assert!(Config::config_location().ends_with("config.toml"));
    }
}
