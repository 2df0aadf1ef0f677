use crate::session::DuplicateResultPolicy;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Path the config was loaded from - not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub repair: RepairConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

// ── Observability ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// "none" | "log" | "memory"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "none".into(),
        }
    }
}

// ── Interceptors ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How to treat several tool results answering the same call.
    #[serde(default)]
    pub duplicate_results: DuplicateResultPolicy,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duplicate_results: DuplicateResultPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Message text that asks for the last request to be resent.
    #[serde(default = "default_replay_trigger")]
    pub trigger: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: default_replay_trigger(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_replay_trigger() -> String {
    crate::hooks::builtin::request_replay::DEFAULT_REPLAY_TRIGGER.into()
}

// ── Loading / saving ─────────────────────────────────────────────

impl Config {
    /// `~/.turnguard/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".turnguard").join("config.toml"))
    }

    /// Read `path` when it exists, otherwise fall back to defaults.
    /// Environment overrides are applied either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };
        config.config_path = path.to_path_buf();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Replay trigger: TURNGUARD_REPLAY_TRIGGER
        if let Some(trigger) = lookup("TURNGUARD_REPLAY_TRIGGER") {
            if !trigger.is_empty() {
                self.replay.trigger = trigger;
            }
        }

        // Observability backend: TURNGUARD_OBSERVABILITY
        if let Some(backend) = lookup("TURNGUARD_OBSERVABILITY") {
            if !backend.is_empty() {
                self.observability.backend = backend;
            }
        }
    }

    /// Write the config as pretty TOML, replacing the file atomically.
    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path) {
            let _ = fs::remove_file(&temp_path);
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        Ok(())
    }
}
