//! Telegram Bot API client and the profile metadata source.
//!
//! Only the handful of methods the bot needs are covered: long-polling for
//! updates, sending replies (optionally with a reply keyboard), and the
//! chat/file lookups used to resolve a profile's name and photo.
//!
//! The bot token is part of every request URL, so URLs are never logged.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use linkhub_core::metadata::{MetadataOutcome, MetadataSource, SiteMetadata};
use linkhub_types::config::TelegramConfig;
use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::LogoImage;

use crate::http::build_client;

/// Slack added to the long-poll timeout for the HTTP request itself.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Telegram file has no download path")]
    MissingFilePath,
}

impl TelegramError {
    /// The API answered definitively that the chat or file does not exist
    /// (or is not visible to the bot).
    pub fn is_not_found(&self) -> bool {
        matches!(self, TelegramError::Api { code: 400 | 403 | 404, .. })
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: ChatRef,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// The highest-resolution size of an attached photo.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_deref()?
            .iter()
            .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file_size.unwrap_or(0)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Result of `getChat`.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo: Option<ChatPhoto>,
}

impl Chat {
    /// Display name: title, else first name, else username.
    pub fn display_name(&self) -> Option<&str> {
        [&self.title, &self.first_name, &self.username]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPhoto {
    pub small_file_id: String,
    pub big_file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// `reply_markup` for `sendMessage`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        one_time_keyboard: bool,
        resize_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

impl ReplyMarkup {
    /// One-shot keyboard laid out row by row.
    pub fn keyboard(rows: &[&[&str]]) -> Self {
        ReplyMarkup::Keyboard {
            keyboard: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|text| KeyboardButton {
                            text: text.to_string(),
                        })
                        .collect()
                })
                .collect(),
            one_time_keyboard: true,
            resize_keyboard: true,
        }
    }

    pub fn remove() -> Self {
        ReplyMarkup::Remove {
            remove_keyboard: true,
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyMarkup>,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

// --- Client ---

/// Minimal Telegram Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(
        token: SecretString,
        config: &TelegramConfig,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = build_client(request_timeout, concat!("linkhub/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base,
            self.token.expose_secret()
        )
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError> {
        let mut request = self.client.post(self.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Error statuses still carry the JSON envelope with a description.
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json()
            .await
            .map_err(|e| e.without_url())?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                code: response.error_code.unwrap_or(0),
                description: response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Long-poll for new updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &params, Some(self.poll_timeout + POLL_GRACE))
            .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        let params = SendMessage {
            chat_id,
            text,
            reply_markup,
        };
        let _sent: serde_json::Value = self.call("sendMessage", &params, None).await?;
        Ok(())
    }

    /// Look up a chat by id or `@username`.
    pub async fn get_chat(&self, chat_id: &str) -> Result<Chat, TelegramError> {
        self.call("getChat", &serde_json::json!({ "chat_id": chat_id }), None)
            .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &serde_json::json!({ "file_id": file_id }), None)
            .await
    }

    /// Resolve a file id and download its contents.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        let file = self.get_file(file_id).await?;
        let path = file.file_path.ok_or(TelegramError::MissingFilePath)?;

        let response = self
            .client
            .get(self.file_url(&path))
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: "file download failed".to_string(),
            });
        }
        Ok(response.bytes().await.map_err(|e| e.without_url())?.to_vec())
    }
}

// --- Profile metadata ---

/// `MetadataSource` backed by the Bot API's view of a public profile:
/// its display name and small profile photo.
pub struct TelegramProfileSource {
    client: Arc<TelegramClient>,
}

impl TelegramProfileSource {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

impl MetadataSource for TelegramProfileSource {
    fn name(&self) -> &'static str {
        "telegram-profile"
    }

    async fn lookup(&self, link: &CanonicalLink) -> MetadataOutcome {
        let handle = link.handle();
        let chat = match self.client.get_chat(&format!("@{handle}")).await {
            Ok(chat) => chat,
            Err(e) if e.is_not_found() => {
                debug!(link = %link, error = %e, "Profile not visible to the bot");
                return MetadataOutcome::NotFound;
            }
            Err(e) => return MetadataOutcome::TransientFailure(format!("getChat: {e}")),
        };

        let title = chat.display_name().unwrap_or(handle).to_string();

        let logo = match &chat.photo {
            Some(photo) => match self.client.download(&photo.small_file_id).await {
                Ok(bytes) => LogoImage::from_bytes(bytes),
                Err(e) => return MetadataOutcome::TransientFailure(format!("profile photo: {e}")),
            },
            None => None,
        };

        MetadataOutcome::Resolved(SiteMetadata {
            title: Some(title),
            logo,
        })
    }
}
