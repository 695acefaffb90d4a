//! The conversation engine.
//!
//! Consumes one inbound message per turn and answers with the signals the
//! chat surface should render. Turns for one session never overlap; the
//! surface is expected to serialise each user's messages.
//!
//! Creation: link1 (+ metadata) -> title? -> logo? -> link2 -> link3 ->
//! deploy -> register. Edit: key -> field choice -> new link -> deploy under
//! the existing project -> register. Both flows register only after the
//! deployment succeeded, so a rejected deployment never leaves the registry
//! pointing at content that was not published.
//!
//! Edits of one project are serialised by a per-key lock held from the
//! registry read until the registry write, and the write is conditional on
//! the revision that was read. The last deployment of a project is always
//! built from the record the registry ends up holding.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use linkhub_types::error::EngineError;
use linkhub_types::link::{CanonicalLink, LinkField};
use linkhub_types::logo::{LogoImage, LogoSlot};
use linkhub_types::project::{NewProject, ProjectKey};

use crate::deploy::{Deployment, SiteDeployer};
use crate::link::normalize_link;
use crate::metadata::{MetadataResolver, MetadataSource};
use crate::publish::SitePublisher;
use crate::registry::{ProjectRegistry, ProjectStore};

use super::session::{
    CompletedDraft, CreationPhase, CreationStep, Draft, EditProgress, Flow, SessionHandle,
    SessionStore, next_creation_phase,
};

/// Word that abandons the edit flow at the field-choice step.
pub const CANCEL_CHOICE: &str = "cancel";

/// Commands that start or stop a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Create,
    Edit,
    Cancel,
}

/// One message from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(Command),
    Text(String),
    /// Raw bytes of an attached image.
    Photo(Vec<u8>),
}

/// What the engine is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Link1,
    Title,
    Logo,
    Link2,
    Link3,
    EditKey,
    EditChoice,
    EditValue(LinkField),
}

/// Output of a turn, rendered by the chat surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Prompt(Prompt),
    /// Input rejected; `reason` is shown verbatim, then `reprompt`.
    Invalid { reason: String, reprompt: Prompt },
    Created { url: String, key: ProjectKey },
    Updated { url: String },
    KeyNotFound,
    Cancelled,
    /// A message arrived with no flow in progress.
    NoActiveFlow,
}

/// Result of advancing a flow: `next` is `None` once the flow has ended.
struct Turn {
    next: Option<Flow>,
    signals: Vec<Signal>,
}

impl Turn {
    fn stay(flow: Flow, signal: Signal) -> Self {
        Self {
            next: Some(flow),
            signals: vec![signal],
        }
    }

    fn end(signal: Signal) -> Self {
        Self {
            next: None,
            signals: vec![signal],
        }
    }
}

/// Orchestrates creation and edit flows over the registry, resolver, and
/// publisher.
pub struct ConversationEngine<S, D, P, F>
where
    S: ProjectStore,
    D: SiteDeployer,
    P: MetadataSource,
    F: MetadataSource,
{
    sessions: SessionStore,
    resolver: MetadataResolver<P, F>,
    publisher: SitePublisher<D>,
    registry: ProjectRegistry<S>,
    edit_locks: DashMap<ProjectKey, Arc<Mutex<()>>>,
}

impl<S, D, P, F> ConversationEngine<S, D, P, F>
where
    S: ProjectStore,
    D: SiteDeployer,
    P: MetadataSource,
    F: MetadataSource,
{
    pub fn new(
        sessions: SessionStore,
        resolver: MetadataResolver<P, F>,
        publisher: SitePublisher<D>,
        registry: ProjectRegistry<S>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            publisher,
            registry,
            edit_locks: DashMap::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn registry(&self) -> &ProjectRegistry<S> {
        &self.registry
    }

    pub fn publisher(&self) -> &SitePublisher<D> {
        &self.publisher
    }

    /// Handle one inbound message.
    ///
    /// Errors are fatal for the turn (storage or deployment failure); the
    /// session is discarded and the surface should report a generic
    /// failure.
    pub async fn handle(
        &self,
        handle: &SessionHandle,
        inbound: Inbound,
    ) -> Result<Vec<Signal>, EngineError> {
        let input = match inbound {
            Inbound::Command(Command::Start | Command::Create) => {
                self.sessions.begin(handle, Flow::Create(Draft::default()));
                return Ok(vec![Signal::Prompt(Prompt::Link1)]);
            }
            Inbound::Command(Command::Edit) => {
                self.sessions.begin(handle, Flow::Edit(EditProgress::AwaitKey));
                return Ok(vec![Signal::Prompt(Prompt::EditKey)]);
            }
            Inbound::Command(Command::Cancel) => {
                let signal = if self.sessions.end(handle) {
                    debug!(session = %handle, "Session cancelled");
                    Signal::Cancelled
                } else {
                    Signal::NoActiveFlow
                };
                return Ok(vec![signal]);
            }
            other => other,
        };

        let Some(session) = self.sessions.take(handle) else {
            return Ok(vec![Signal::NoActiveFlow]);
        };

        let turn = match session.flow.clone() {
            Flow::Create(draft) => self.step_create(draft, input).await?,
            Flow::Edit(progress) => self.step_edit(progress, input).await?,
        };

        if let Some(flow) = turn.next {
            self.sessions.resume(handle, session, flow);
        }
        Ok(turn.signals)
    }

    // --- Creation flow ---

    async fn step_create(&self, mut draft: Draft, input: Inbound) -> Result<Turn, EngineError> {
        let phase = match next_creation_phase(&draft) {
            CreationStep::Ask(phase) => phase,
            CreationStep::Finalize(done) => return self.finalize(*done).await,
        };
        let prompt = prompt_for(phase);

        match (phase, input) {
            (CreationPhase::Link1, Inbound::Text(text)) => {
                let link = match normalize_link(&text) {
                    Ok(link) => link,
                    Err(e) => return Ok(invalid(Flow::Create(draft), e.to_string(), prompt)),
                };
                if let Some(meta) = self.resolver.resolve(&link).await.into_metadata() {
                    draft.title = meta.title;
                    draft.logos[0] = meta.logo.map(|logo| LogoSlot::for_slot(1, &logo));
                }
                draft.links[0] = Some(link);
            }
            (CreationPhase::AskTitle, Inbound::Text(text)) => {
                let title = text.trim();
                if title.is_empty() {
                    let reason = "The title cannot be empty.".to_string();
                    return Ok(invalid(Flow::Create(draft), reason, prompt));
                }
                draft.title = Some(title.to_string());
            }
            (CreationPhase::AskLogo, Inbound::Photo(bytes)) => match LogoImage::from_bytes(bytes) {
                Some(image) => draft.logos[0] = Some(LogoSlot::for_slot(1, &image)),
                None => {
                    let reason = "Unsupported image format. Send a PNG, JPEG, GIF, or WEBP image."
                        .to_string();
                    return Ok(invalid(Flow::Create(draft), reason, prompt));
                }
            },
            (CreationPhase::AskLogo, _) => {
                let reason = "Please send the logo as an image.".to_string();
                return Ok(invalid(Flow::Create(draft), reason, prompt));
            }
            (CreationPhase::Link2 | CreationPhase::Link3, Inbound::Text(text)) => {
                let index = if phase == CreationPhase::Link2 { 1 } else { 2 };
                let link = match normalize_link(&text) {
                    Ok(link) => link,
                    Err(e) => return Ok(invalid(Flow::Create(draft), e.to_string(), prompt)),
                };
                draft.logos[index] = self.secondary_logo(&link, index, &draft).await;
                draft.links[index] = Some(link);
            }
            (_, _) => {
                let reason = "Please reply with text.".to_string();
                return Ok(invalid(Flow::Create(draft), reason, prompt));
            }
        }

        match next_creation_phase(&draft) {
            CreationStep::Ask(next) => Ok(Turn::stay(
                Flow::Create(draft),
                Signal::Prompt(prompt_for(next)),
            )),
            CreationStep::Finalize(done) => self.finalize(*done).await,
        }
    }

    /// Logo for slot 2 or 3: the link's own metadata logo, else an exact
    /// copy of the slot-1 logo (same bytes, same filename).
    async fn secondary_logo(
        &self,
        link: &CanonicalLink,
        index: usize,
        draft: &Draft,
    ) -> Option<LogoSlot> {
        let resolved = self
            .resolver
            .resolve(link)
            .await
            .into_metadata()
            .and_then(|meta| meta.logo);

        match resolved {
            Some(logo) => Some(LogoSlot::for_slot(index + 1, &logo)),
            None => {
                debug!(link = %link, slot = index + 1, "No logo resolved, reusing slot 1");
                draft.logos[0].clone()
            }
        }
    }

    async fn finalize(&self, done: CompletedDraft) -> Result<Turn, EngineError> {
        let deployment = self
            .publisher
            .publish(&done.title, &done.links, &done.logos, None)
            .await?;

        let record = self
            .registry
            .create(NewProject {
                project_id: deployment.project_id,
                title: done.title,
                links: done.links,
                logos: done.logos,
            })
            .await?;

        info!(key = %record.key, url = %deployment.url, "Hub page created");
        Ok(Turn::end(Signal::Created {
            url: deployment.url,
            key: record.key,
        }))
    }

    // --- Edit flow ---

    async fn step_edit(&self, progress: EditProgress, input: Inbound) -> Result<Turn, EngineError> {
        let Inbound::Text(text) = input else {
            let prompt = edit_prompt(&progress);
            let reason = "Please reply with text.".to_string();
            return Ok(invalid(Flow::Edit(progress), reason, prompt));
        };

        match progress {
            EditProgress::AwaitKey => {
                let record = match ProjectKey::parse(&text) {
                    Some(key) => self.registry.find(&key).await?,
                    None => None,
                };
                match record {
                    Some(record) => Ok(Turn::stay(
                        Flow::Edit(EditProgress::AwaitChoice { key: record.key }),
                        Signal::Prompt(Prompt::EditChoice),
                    )),
                    None => {
                        debug!("Edit key not found");
                        Ok(Turn::end(Signal::KeyNotFound))
                    }
                }
            }
            EditProgress::AwaitChoice { key } => {
                if text.trim().eq_ignore_ascii_case(CANCEL_CHOICE) {
                    return Ok(Turn::end(Signal::Cancelled));
                }
                match text.parse::<LinkField>() {
                    Ok(field) => Ok(Turn::stay(
                        Flow::Edit(EditProgress::AwaitValue { key, field }),
                        Signal::Prompt(Prompt::EditValue(field)),
                    )),
                    Err(_) => {
                        let options: Vec<&str> = LinkField::ALL.iter().map(|f| f.label()).collect();
                        let reason = format!("Choose one of: {}, or Cancel.", options.join(", "));
                        Ok(invalid(
                            Flow::Edit(EditProgress::AwaitChoice { key }),
                            reason,
                            Prompt::EditChoice,
                        ))
                    }
                }
            }
            EditProgress::AwaitValue { key, field } => {
                let link = match normalize_link(&text) {
                    Ok(link) => link,
                    Err(e) => {
                        return Ok(invalid(
                            Flow::Edit(EditProgress::AwaitValue { key, field }),
                            e.to_string(),
                            Prompt::EditValue(field),
                        ));
                    }
                };

                let lock = self.edit_lock(&key);
                let outcome = {
                    let _guard = lock.lock().await;
                    self.publish_edit(&key, field, link).await
                };
                drop(lock);
                self.edit_locks
                    .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
                let deployment = outcome?;

                info!(key = %key, field = %field, url = %deployment.url, "Hub page updated");
                Ok(Turn::end(Signal::Updated {
                    url: deployment.url,
                }))
            }
        }
    }

    /// Deploy the record with `field` replaced, then store it under the
    /// revision the deployment was built from.
    async fn publish_edit(
        &self,
        key: &ProjectKey,
        field: LinkField,
        link: CanonicalLink,
    ) -> Result<Deployment, EngineError> {
        let mut record = self.registry.get(key).await?;
        let read_at = record.revision;
        record.set_link(field, link.clone());
        let deployment = self.publisher.publish_record(&record).await?;
        self.registry.update_at(key, field, link, read_at).await?;
        Ok(deployment)
    }

    fn edit_lock(&self, key: &ProjectKey) -> Arc<Mutex<()>> {
        Arc::clone(self.edit_locks.entry(key.clone()).or_default().value())
    }
}

fn invalid(flow: Flow, reason: String, reprompt: Prompt) -> Turn {
    Turn::stay(flow, Signal::Invalid { reason, reprompt })
}

fn prompt_for(phase: CreationPhase) -> Prompt {
    match phase {
        CreationPhase::Link1 => Prompt::Link1,
        CreationPhase::AskTitle => Prompt::Title,
        CreationPhase::AskLogo => Prompt::Logo,
        CreationPhase::Link2 => Prompt::Link2,
        CreationPhase::Link3 => Prompt::Link3,
    }
}

fn edit_prompt(progress: &EditProgress) -> Prompt {
    match progress {
        EditProgress::AwaitKey => Prompt::EditKey,
        EditProgress::AwaitChoice { .. } => Prompt::EditChoice,
        EditProgress::AwaitValue { field, .. } => Prompt::EditValue(*field),
    }
}
