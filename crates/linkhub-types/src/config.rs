//! Configuration types for the link hub service.
//!
//! `HubConfig` represents the top-level `config.toml` in the data directory.
//! Every field has a default, so an empty or missing file is valid. API
//! tokens are deliberately absent: they come from the environment.

use serde::{Deserialize, Serialize};

use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub hosting: HostingConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub templates: TemplateConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL (without the `/bot<token>` suffix).
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// Hosting platform (Vercel) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    #[serde(default = "default_hosting_api_base")]
    pub api_base: String,

    /// Optional team scope for deployments.
    #[serde(default)]
    pub team_id: Option<String>,

    /// Prefix for generated project slugs.
    #[serde(default = "default_project_prefix")]
    pub project_prefix: String,

    /// Public domain suffix: a project `p` is served at `https://p.<suffix>`.
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

fn default_hosting_api_base() -> String {
    "https://api.vercel.com".to_string()
}

fn default_project_prefix() -> String {
    "multilink".to_string()
}

fn default_domain_suffix() -> String {
    "vercel.app".to_string()
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_base: default_hosting_api_base(),
            team_id: None,
            project_prefix: default_project_prefix(),
            domain_suffix: default_domain_suffix(),
        }
    }
}

/// Metadata resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Upper bound for each page, image, or profile lookup.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are discarded.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// Page template location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory containing `index.html` and `style.css`. When unset, the
    /// templates built into the binary are used.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}
