//! Configuration loading (spec §9 ambient stack; no counterpart in the
//! reference bot framework, which has no `config.rs` of its own).
//!
//! Grounded on the layered `Option<...>`-field pattern from
//! `rusty-claw-core::config` (every section optional, `resolve_*` helpers
//! preferring a direct value over an env-var reference, a single JSON file
//! under the user's data directory) adapted to this system's four sections:
//! bus sizing, the Telegram channel, the typing coordinator, and the
//! scheduler's storage path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration. Every section is optional; a missing file or a
/// missing section falls back to documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub typing: Option<TypingSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSettings>,
}

/// Bus topic/subscriber queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_capacity: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_capacity: Option<usize>,
}

/// Telegram channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token_env: Option<String>,

    /// Allowed sender (user) ids. Empty means allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Allowed chat ids. Empty means allow all.
    #[serde(default)]
    pub allowed_chats: Vec<String>,

    /// Whether to parse outbound Markdown-hinted content for this channel
    /// (spec §4.4 fallback ladder still applies on a parse failure).
    #[serde(default = "default_true")]
    pub parse_markdown: bool,

    /// Maximum characters per Telegram message before splitting.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Whether a bare (unprefixed) session id is accepted as a Telegram
    /// chat id (spec §9 open question 1). Defaults to `true` to preserve
    /// compatibility with sessions created before channel-prefixed ids.
    #[serde(default = "default_true")]
    pub accept_legacy_session_ids: bool,

    /// Send every text message with Telegram's `disable_notification` flag
    /// set (spec §4.4 "silent flag if quiet-mode configured").
    #[serde(default)]
    pub quiet_mode: bool,

    /// Per-send deadline in seconds (spec §4.4/§5/§7: "Send with per-send
    /// timeout (reference: 5 s)"). Elapsing surfaces as
    /// [`crate::error::ChannelError::Timeout`] to the originating caller.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// If set, local media paths (spec §4.4 "local path … conforms to
    /// safe-path policy") must resolve within this directory; paths that
    /// escape it or contain traversal components are rejected. `None`
    /// still rejects traversal components but allows any absolute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_root: Option<String>,
}

impl TelegramSettings {
    /// Resolve the bot token: direct value first, then the named env var.
    #[must_use]
    pub fn resolve_bot_token(&self) -> Option<String> {
        resolve_secret_field(&self.bot_token, &self.bot_token_env)
    }

    /// Effective per-send timeout.
    #[must_use]
    pub fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_token_env: Some("TELEGRAM_BOT_TOKEN".to_string()),
            allowed_users: Vec::new(),
            allowed_chats: Vec::new(),
            parse_markdown: true,
            max_message_length: default_max_message_length(),
            accept_legacy_session_ids: true,
            quiet_mode: false,
            send_timeout_secs: default_send_timeout_secs(),
            media_root: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_message_length() -> usize {
    4096
}

fn default_send_timeout_secs() -> u64 {
    5
}

/// Typing coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingSettings {
    /// Seconds between activity signals while a session is processing.
    #[serde(default = "default_typing_cadence_secs")]
    pub cadence_secs: u64,
}

impl Default for TypingSettings {
    fn default() -> Self {
        Self {
            cadence_secs: default_typing_cadence_secs(),
        }
    }
}

fn default_typing_cadence_secs() -> u64 {
    3
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Path to the JSON job store. Relative to the config directory if not
    /// absolute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,

    /// Seconds between due-job checks.
    #[serde(default = "default_scheduler_check_secs")]
    pub check_interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            storage_path: None,
            check_interval_secs: default_scheduler_check_secs(),
        }
    }
}

fn default_scheduler_check_secs() -> u64 {
    1
}

/// Logging settings (spec §A.1 ambient stack).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level override (trace/debug/info/warn/error); falls back to
    /// `RUST_LOG` then `"info"` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Emit `tracing_subscriber::fmt::json` instead of the default
    /// human-readable formatter.
    #[serde(default)]
    pub json: bool,
}

/// Resolve a secret: direct value first, then the named environment
/// variable, skipping empty strings either way.
#[must_use]
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

impl Config {
    /// Load config from `path`. A missing file is not an error: it returns
    /// `Config::default()`.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from the default config path, falling back to defaults on any
    /// load error (missing/invalid file never blocks startup).
    pub async fn load_default() -> Self {
        Self::load(&config_path()).await.unwrap_or_default()
    }

    /// Save config to `path` as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Effective bus topic capacity.
    #[must_use]
    pub fn bus_topic_capacity(&self) -> usize {
        self.bus.as_ref().and_then(|b| b.topic_capacity).unwrap_or(256)
    }

    /// Effective bus subscriber capacity.
    #[must_use]
    pub fn bus_subscriber_capacity(&self) -> usize {
        self.bus.as_ref().and_then(|b| b.subscriber_capacity).unwrap_or(8)
    }

    /// Effective Telegram settings, defaulted if absent.
    #[must_use]
    pub fn telegram(&self) -> TelegramSettings {
        self.telegram.clone().unwrap_or_default()
    }

    /// Effective typing cadence.
    #[must_use]
    pub fn typing_cadence(&self) -> std::time::Duration {
        let secs = self.typing.as_ref().map_or(default_typing_cadence_secs(), |t| t.cadence_secs);
        std::time::Duration::from_secs(secs)
    }

    /// Effective scheduler job-store path.
    #[must_use]
    pub fn scheduler_storage_path(&self) -> PathBuf {
        self.scheduler
            .as_ref()
            .and_then(|s| s.storage_path.as_ref())
            .map_or_else(|| data_dir().join("jobs.json"), PathBuf::from)
    }

    /// Effective scheduler check interval.
    #[must_use]
    pub fn scheduler_check_interval(&self) -> std::time::Duration {
        let secs = self.scheduler.as_ref().map_or(default_scheduler_check_secs(), |s| s.check_interval_secs);
        std::time::Duration::from_secs(secs)
    }
}

/// Base data directory: `~/.config/relaybus` (via `dirs_next::config_dir`),
/// falling back to `./.relaybus` if the platform config dir is unavailable.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs_next::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("relaybus")
}

/// Default config file path: `<data_dir>/config.json`.
#[must_use]
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.bus_topic_capacity(), 256);
        assert_eq!(config.bus_subscriber_capacity(), 8);
        assert!(config.telegram().accept_legacy_session_ids);
        assert_eq!(config.typing_cadence(), std::time::Duration::from_secs(3));
        assert_eq!(config.scheduler_check_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_resolve_bot_token_prefers_direct() {
        // SAFETY: test-only, no other test in this module touches this var.
        unsafe { std::env::set_var("RELAYBUS_TEST_TOKEN", "from-env") };
        let settings = TelegramSettings {
            bot_token: Some("direct".to_string()),
            bot_token_env: Some("RELAYBUS_TEST_TOKEN".to_string()),
            ..TelegramSettings::default()
        };
        assert_eq!(settings.resolve_bot_token(), Some("direct".to_string()));
        unsafe { std::env::remove_var("RELAYBUS_TEST_TOKEN") };
    }

    #[test]
    fn test_resolve_bot_token_falls_back_to_env() {
        // SAFETY: test-only, no other test in this module touches this var.
        unsafe { std::env::set_var("RELAYBUS_TEST_TOKEN2", "from-env") };
        let settings = TelegramSettings {
            bot_token: None,
            bot_token_env: Some("RELAYBUS_TEST_TOKEN2".to_string()),
            ..TelegramSettings::default()
        };
        assert_eq!(settings.resolve_bot_token(), Some("from-env".to_string()));
        unsafe { std::env::remove_var("RELAYBUS_TEST_TOKEN2") };
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.bus_topic_capacity(), 256);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.telegram = Some(TelegramSettings {
            allowed_users: vec!["42".to_string()],
            ..TelegramSettings::default()
        });
        config.save(&path).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.telegram().allowed_users, vec!["42".to_string()]);
    }
}
