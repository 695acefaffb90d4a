//! Application state wiring all services together.
//!
//! Services in `linkhub-core` are generic over their port traits; this
//! module pins them to the concrete infra adapters. Credentials are read
//! from the environment only by the commands that need them, so `list` and
//! `show` work without any tokens configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use secrecy::SecretString;

use linkhub_core::conversation::{ConversationEngine, SessionStore};
use linkhub_core::metadata::MetadataResolver;
use linkhub_core::publish::SitePublisher;
use linkhub_core::registry::ProjectRegistry;
use linkhub_core::render::Templates;
use linkhub_infra::config::{load_hub_config, load_templates, resolve_data_dir};
use linkhub_infra::opengraph::OpenGraphSource;
use linkhub_infra::store::JsonProjectStore;
use linkhub_infra::telegram::{TelegramClient, TelegramProfileSource};
use linkhub_infra::vercel::VercelDeployer;
use linkhub_types::config::HubConfig;

/// Environment variable holding the Telegram bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable holding the Vercel API token.
pub const VERCEL_TOKEN_ENV: &str = "VERCEL_TOKEN";

const BUILTIN_MARKUP: &str = include_str!("../templates/index.html");
const BUILTIN_STYLESHEET: &str = include_str!("../templates/style.css");

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteRegistry = ProjectRegistry<JsonProjectStore>;

pub type ConcretePublisher = SitePublisher<VercelDeployer>;

pub type ConcreteEngine =
    ConversationEngine<JsonProjectStore, VercelDeployer, OpenGraphSource, TelegramProfileSource>;

/// Shared application state: data directory, configuration, and the
/// registry every command uses.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: HubConfig,
    pub registry: ConcreteRegistry,
}

impl AppState {
    /// Resolve the data directory, load configuration, open the registry.
    pub async fn init() -> Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_hub_config(&data_dir).await;
        let registry = ProjectRegistry::new(JsonProjectStore::new(&data_dir));

        Ok(Self {
            data_dir,
            config,
            registry,
        })
    }

    /// Page templates: the configured directory, else the built-in pair.
    pub async fn templates(&self) -> Result<Templates> {
        match &self.config.templates.dir {
            Some(dir) => Ok(load_templates(dir).await?),
            None => Ok(builtin_templates()),
        }
    }

    /// Publisher backed by Vercel. Requires `VERCEL_TOKEN`.
    pub async fn publisher(&self) -> Result<ConcretePublisher> {
        let token = require_token(VERCEL_TOKEN_ENV)?;
        let deployer = VercelDeployer::new(token, &self.config.hosting)
            .context("failed to build hosting client")?;
        Ok(SitePublisher::new(self.templates().await?, deployer))
    }

    /// Telegram client. Requires `TELEGRAM_BOT_TOKEN`.
    pub fn telegram_client(&self) -> Result<TelegramClient> {
        let token = require_token(TELEGRAM_TOKEN_ENV)?;
        TelegramClient::new(token, &self.config.telegram, self.fetch_timeout())
            .context("failed to build Telegram client")
    }

    /// Conversation engine wired to the JSON registry, Vercel, and both
    /// metadata sources. Consumes the state's registry.
    pub async fn into_engine(self, telegram: Arc<TelegramClient>) -> Result<ConcreteEngine> {
        let publisher = self.publisher().await?;
        let page = OpenGraphSource::new(&self.config.metadata)
            .context("failed to build metadata client")?;
        let profile = TelegramProfileSource::new(telegram);
        // The resolver bound covers a page fetch plus its image download.
        let resolver = MetadataResolver::new(page, profile, self.fetch_timeout() * 2);
        let sessions =
            SessionStore::new(Duration::from_secs(self.config.session.idle_timeout_secs));

        Ok(ConversationEngine::new(
            sessions,
            resolver,
            publisher,
            self.registry,
        ))
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.metadata.fetch_timeout_secs)
    }
}

pub fn builtin_templates() -> Templates {
    Templates {
        markup: BUILTIN_MARKUP.to_string(),
        stylesheet: BUILTIN_STYLESHEET.to_string(),
    }
}

fn require_token(var: &str) -> Result<SecretString> {
    let value = std::env::var(var).with_context(|| format!("{var} is not set"))?;
    if value.trim().is_empty() {
        bail!("{var} is empty");
    }
    Ok(SecretString::from(value.trim().to_string()))
}
