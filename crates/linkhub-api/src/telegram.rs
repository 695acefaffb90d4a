//! Telegram long-polling surface.
//!
//! Updates are fetched with `getUpdates` and fanned out to one worker task
//! per user, so a user's messages are handled strictly in order while
//! different users proceed concurrently. A worker exits after a quiet
//! period and is recreated on the user's next message.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use linkhub_core::conversation::{Command, Inbound, Prompt, SessionHandle, Signal};
use linkhub_infra::telegram::{Message, ReplyMarkup, TelegramClient};
use linkhub_types::link::LinkField;

use crate::state::ConcreteEngine;

/// Pause before polling again after a failed `getUpdates`.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// How long a user's worker waits for another message before exiting.
const WORKER_IDLE: Duration = Duration::from_secs(300);

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

const HELP_TEXT: &str = "Send /create to build a new link page, /edit to change a link on an \
existing page, or /cancel to stop.";

const FAILURE_TEXT: &str =
    "Something went wrong while publishing your page. Please start again with /create.";

const PHOTO_RETRY_TEXT: &str = "Couldn't download that photo. Please send it again.";

/// One outgoing message.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    fn with_markup(text: impl Into<String>, markup: ReplyMarkup) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup),
        }
    }
}

/// A parsed `/command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedCommand {
    Known(Command),
    Unknown,
}

/// Parse a command message. Returns `None` for plain text.
///
/// Accepts the `/command@botname` form Telegram uses in group chats and
/// ignores any arguments.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "create" => Command::Create,
        "edit" => Command::Edit,
        "cancel" => Command::Cancel,
        _ => return Some(ParsedCommand::Unknown),
    };
    Some(ParsedCommand::Known(command))
}

fn prompt_reply(prompt: Prompt) -> Reply {
    match prompt {
        Prompt::Link1 => {
            Reply::text("1️⃣ Send the link to your main bot (@username or https://t.me/username):")
        }
        Prompt::Title => Reply::text("🏷 Send the site title:"),
        Prompt::Logo => Reply::text("📸 Send the logo as a photo:"),
        Prompt::Link2 => Reply::text("2️⃣ Send the link to your backup bot:"),
        Prompt::Link3 => Reply::text("3️⃣ Send the link to your channel:"),
        Prompt::EditKey => Reply::text("🔑 Enter your edit key:"),
        Prompt::EditChoice => Reply::with_markup(
            "What do you want to change?",
            ReplyMarkup::keyboard(&[
                &[LinkField::Link1.label(), LinkField::Link2.label()],
                &[LinkField::Link3.label(), "Cancel"],
            ]),
        ),
        Prompt::EditValue(field) => Reply::with_markup(
            format!("New link for the {}:", field.label().to_lowercase()),
            ReplyMarkup::remove(),
        ),
    }
}

/// Chat replies for one engine signal.
pub fn render_signal(signal: &Signal) -> Vec<Reply> {
    match signal {
        Signal::Prompt(prompt) => vec![prompt_reply(*prompt)],
        Signal::Invalid { reason, reprompt } => {
            vec![Reply::text(format!("❌ {reason}")), prompt_reply(*reprompt)]
        }
        Signal::Created { url, key } => vec![Reply::text(format!(
            "🎉 Done!\nSite: {url}\n\n🔑 Edit key: {key}\nUse /edit to update the links."
        ))],
        Signal::Updated { url } => vec![Reply::text(format!("✅ Updated! Your site: {url}"))],
        Signal::KeyNotFound => vec![Reply::with_markup("❌ Key not found.", ReplyMarkup::remove())],
        Signal::Cancelled => vec![Reply::with_markup("Cancelled.", ReplyMarkup::remove())],
        Signal::NoActiveFlow => vec![Reply::text(HELP_TEXT)],
    }
}

/// Per-user FIFO queues with at most one consumer each.
///
/// Pushing and retiring both happen under the map's shard lock, so once a
/// consumer has retired nothing more can reach its queue, and a user never
/// has two consumers at the same time.
struct UserQueues<T> {
    senders: DashMap<i64, UnboundedSender<T>>,
}

/// The receiving end of one user's queue.
struct QueueConsumer<T> {
    user_id: i64,
    own: UnboundedSender<T>,
    rx: UnboundedReceiver<T>,
}

impl<T> UserQueues<T> {
    fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Append `item` to the user's queue. Returns a consumer when a new
    /// queue had to be opened; the caller must drain it.
    fn push(&self, user_id: i64, item: T) -> Option<QueueConsumer<T>> {
        let item = match self.senders.get(&user_id) {
            Some(tx) => match tx.send(item) {
                Ok(()) => return None,
                // The consumer went away without retiring.
                Err(mpsc::error::SendError(item)) => item,
            },
            None => item,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(item).is_err() {
            return None;
        }
        self.senders.insert(user_id, tx.clone());
        Some(QueueConsumer {
            user_id,
            own: tx,
            rx,
        })
    }

    /// Unregister `consumer` if its queue is empty. Returns `false` when
    /// items are still waiting; the consumer must keep draining.
    fn retire(&self, consumer: &QueueConsumer<T>) -> bool {
        self.senders
            .remove_if(&consumer.user_id, |_, tx| {
                tx.same_channel(&consumer.own) && consumer.rx.is_empty()
            })
            .is_some()
    }
}

/// Routes updates to per-user workers.
struct Dispatcher {
    engine: Arc<ConcreteEngine>,
    client: Arc<TelegramClient>,
    workers: UserQueues<Message>,
}

impl Dispatcher {
    /// Queue a message on its sender's worker, starting one if needed.
    fn dispatch(self: &Arc<Self>, message: Message) {
        let user_id = sender_id(&message);
        let Some(consumer) = self.workers.push(user_id, message) else {
            return;
        };

        debug!(user_id, "Worker started");
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.run_worker(consumer).await });
    }

    async fn run_worker(&self, mut consumer: QueueConsumer<Message>) {
        loop {
            match tokio::time::timeout(WORKER_IDLE, consumer.rx.recv()).await {
                Ok(Some(message)) => self.handle_message(message).await,
                Ok(None) => break,
                Err(_) => {
                    if self.workers.retire(&consumer) {
                        break;
                    }
                }
            }
        }
        debug!(user_id = consumer.user_id, "Worker stopped");
    }

    async fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;
        let handle = SessionHandle::from(sender_id(&message));

        let inbound = if let Some(text) = &message.text {
            match parse_command(text) {
                Some(ParsedCommand::Known(command)) => Inbound::Command(command),
                Some(ParsedCommand::Unknown) => {
                    self.send(chat_id, &Reply::text(HELP_TEXT)).await;
                    return;
                }
                None => Inbound::Text(text.clone()),
            }
        } else if let Some(photo) = message.largest_photo() {
            match self.client.download(&photo.file_id).await {
                Ok(bytes) => Inbound::Photo(bytes),
                Err(e) => {
                    warn!(session = %handle, error = %e, "Photo download failed");
                    self.send(chat_id, &Reply::text(PHOTO_RETRY_TEXT)).await;
                    return;
                }
            }
        } else {
            debug!(session = %handle, "Ignoring message without text or photo");
            return;
        };

        let replies = match self.engine.handle(&handle, inbound).await {
            Ok(signals) => signals.iter().flat_map(render_signal).collect(),
            Err(e) => {
                error!(session = %handle, error = %e, "Conversation turn failed");
                vec![Reply::with_markup(FAILURE_TEXT, ReplyMarkup::remove())]
            }
        };

        for reply in &replies {
            self.send(chat_id, reply).await;
        }
    }

    async fn send(&self, chat_id: i64, reply: &Reply) {
        if let Err(e) = self
            .client
            .send_message(chat_id, &reply.text, reply.markup.as_ref())
            .await
        {
            warn!(chat_id, error = %e, "Failed to send reply");
        }
    }
}

/// Sessions are per user; fall back to the chat for anonymous senders.
fn sender_id(message: &Message) -> i64 {
    message.from.as_ref().map_or(message.chat.id, |user| user.id)
}

/// Poll for updates until `shutdown` resolves.
pub async fn serve(
    engine: Arc<ConcreteEngine>,
    client: Arc<TelegramClient>,
    shutdown: impl Future<Output = ()>,
) {
    let dispatcher = Arc::new(Dispatcher {
        engine: Arc::clone(&engine),
        client: Arc::clone(&client),
        workers: UserQueues::new(),
    });

    let purge_engine = Arc::clone(&engine);
    let purger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            purge_engine.sessions().purge_expired();
        }
    });

    info!("Bot is polling for updates");
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;

    loop {
        let updates = tokio::select! {
            _ = &mut shutdown => break,
            result = client.get_updates(offset) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message {
                        dispatcher.dispatch(message);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Polling failed, retrying");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }

    purger.abort();
    info!("Bot stopped polling");
}
