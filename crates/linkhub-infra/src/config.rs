//! Configuration loading.
//!
//! Reads `config.toml` from the data directory (`~/.linkhub/` by default)
//! into [`HubConfig`], falling back to defaults when the file is missing or
//! malformed. Also resolves the data directory and loads page templates
//! from a configured directory.

use std::path::{Path, PathBuf};

use linkhub_core::render::Templates;
use linkhub_types::config::HubConfig;
use linkhub_types::error::TemplateError;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LINKHUB_DATA_DIR";

/// Template file names inside a template directory.
pub const MARKUP_TEMPLATE: &str = "index.html";
pub const STYLESHEET_TEMPLATE: &str = "style.css";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparseable file: a warning, then defaults.
pub async fn load_hub_config(data_dir: &Path) -> HubConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return HubConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HubConfig::default();
        }
    };

    match toml::from_str::<HubConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HubConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `LINKHUB_DATA_DIR` environment variable
/// 2. `~/.linkhub`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".linkhub");
    }

    PathBuf::from(".linkhub")
}

/// Read `index.html` and `style.css` from a template directory.
pub async fn load_templates(dir: &Path) -> Result<Templates, TemplateError> {
    let read = |name: &str| {
        let path = dir.join(name);
        async move {
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| TemplateError::Read { path, source })
        }
    };

    Ok(Templates {
        markup: read(MARKUP_TEMPLATE).await?,
        stylesheet: read(STYLESHEET_TEMPLATE).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_hub_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_hub_config(tmp.path()).await;
        assert_eq!(config.hosting.project_prefix, "multilink");
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert!(config.templates.dir.is_none());
    }

    #[tokio::test]
    async fn load_hub_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[hosting]
team_id = "team_123"
project_prefix = "hub"

[metadata]
fetch_timeout_secs = 2
"#,
        )
        .await
        .unwrap();

        let config = load_hub_config(tmp.path()).await;
        assert_eq!(config.hosting.team_id.as_deref(), Some("team_123"));
        assert_eq!(config.hosting.project_prefix, "hub");
        assert_eq!(config.hosting.domain_suffix, "vercel.app");
        assert_eq!(config.metadata.fetch_timeout_secs, 2);
    }

    #[tokio::test]
    async fn load_hub_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "[hosting\nteam_id = ")
            .await
            .unwrap();

        let config = load_hub_config(tmp.path()).await;
        assert!(config.hosting.team_id.is_none());
    }

    #[tokio::test]
    async fn load_templates_reads_both_files() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("index.html"), "<h1>%%TITLE%%</h1>")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("style.css"), "body {}")
            .await
            .unwrap();

        let templates = load_templates(tmp.path()).await.unwrap();
        assert_eq!(templates.markup, "<h1>%%TITLE%%</h1>");
        assert_eq!(templates.stylesheet, "body {}");
    }

    #[tokio::test]
    async fn load_templates_missing_file_names_path() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("index.html"), "<p></p>")
            .await
            .unwrap();

        let err = load_templates(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("style.css"));
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-linkhub");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-linkhub"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
