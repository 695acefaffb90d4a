//! Conversation sessions.
//!
//! A session holds the accumulated state of one in-progress flow. The
//! creation flow's current phase is never stored: it is derived from the
//! accumulated fields by [`next_creation_phase`], so "skip a prompt the
//! resolver already answered" is an explicit transition guard.
//!
//! Sessions live in a [`SessionStore`] addressed by opaque handles, with an
//! idle timeout after which they are discarded.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use linkhub_types::link::{CanonicalLink, LinkField};
use linkhub_types::logo::LogoSlot;
use linkhub_types::project::ProjectKey;

/// Conversation states. The terminal state is the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Link1,
    AskTitle,
    AskLogo,
    Link2,
    Link3,
    EditKey,
    EditChoice,
    EditNew,
}

/// Fields collected by the creation flow so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub links: [Option<CanonicalLink>; 3],
    pub title: Option<String>,
    pub logos: [Option<LogoSlot>; 3],
}

/// Everything needed to publish, extracted from a finished draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDraft {
    pub title: String,
    pub links: [CanonicalLink; 3],
    pub logos: [LogoSlot; 3],
}

impl Draft {
    /// Extract the finished fields, or `None` if anything is still missing.
    pub fn complete(&self) -> Option<CompletedDraft> {
        match next_creation_phase(self) {
            CreationStep::Finalize(done) => Some(*done),
            CreationStep::Ask(_) => None,
        }
    }
}

/// The prompts of the creation flow, in the order they are asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationPhase {
    Link1,
    AskTitle,
    AskLogo,
    Link2,
    Link3,
}

impl From<CreationPhase> for Phase {
    fn from(phase: CreationPhase) -> Self {
        match phase {
            CreationPhase::Link1 => Phase::Link1,
            CreationPhase::AskTitle => Phase::AskTitle,
            CreationPhase::AskLogo => Phase::AskLogo,
            CreationPhase::Link2 => Phase::Link2,
            CreationPhase::Link3 => Phase::Link3,
        }
    }
}

/// What the creation flow should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationStep {
    Ask(CreationPhase),
    Finalize(Box<CompletedDraft>),
}

/// Transition guard for the creation flow.
///
/// Fields are requested strictly in the order link1, title, logo, link2,
/// link3; anything already filled (by the user or by metadata resolution)
/// is skipped. Links 2 and 3 count as answered only together with their
/// logo slot.
pub fn next_creation_phase(draft: &Draft) -> CreationStep {
    let Some(link1) = &draft.links[0] else {
        return CreationStep::Ask(CreationPhase::Link1);
    };
    let Some(title) = &draft.title else {
        return CreationStep::Ask(CreationPhase::AskTitle);
    };
    let Some(logo1) = &draft.logos[0] else {
        return CreationStep::Ask(CreationPhase::AskLogo);
    };
    let (Some(link2), Some(logo2)) = (&draft.links[1], &draft.logos[1]) else {
        return CreationStep::Ask(CreationPhase::Link2);
    };
    let (Some(link3), Some(logo3)) = (&draft.links[2], &draft.logos[2]) else {
        return CreationStep::Ask(CreationPhase::Link3);
    };

    CreationStep::Finalize(Box::new(CompletedDraft {
        title: title.clone(),
        links: [link1.clone(), link2.clone(), link3.clone()],
        logos: [logo1.clone(), logo2.clone(), logo3.clone()],
    }))
}

/// Progress through the edit flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditProgress {
    AwaitKey,
    AwaitChoice { key: ProjectKey },
    AwaitValue { key: ProjectKey, field: LinkField },
}

/// The flow a session is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Create(Draft),
    Edit(EditProgress),
}

impl Flow {
    /// The step waiting for input. A complete draft waits for nothing: it
    /// is published in the turn that completed it.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Flow::Create(draft) => match next_creation_phase(draft) {
                CreationStep::Ask(phase) => Some(phase.into()),
                CreationStep::Finalize(_) => None,
            },
            Flow::Edit(EditProgress::AwaitKey) => Some(Phase::EditKey),
            Flow::Edit(EditProgress::AwaitChoice { .. }) => Some(Phase::EditChoice),
            Flow::Edit(EditProgress::AwaitValue { .. }) => Some(Phase::EditNew),
        }
    }
}

/// Opaque address of one conversation (one per chat user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<i64> for SessionHandle {
    fn from(user_id: i64) -> Self {
        Self(user_id.to_string())
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One in-progress conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub flow: Flow,
    pub started_at: Instant,
    pub touched_at: Instant,
}

impl Session {
    pub fn new(flow: Flow) -> Self {
        let now = Instant::now();
        Self {
            flow,
            started_at: now,
            touched_at: now,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.flow.phase()
    }

    /// Time since the flow was started, however often it was resumed.
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Concurrent map of live sessions with idle expiry.
///
/// Sessions are taken out for the duration of a turn and put back after,
/// so no map guard is ever held across an await.
pub struct SessionStore {
    sessions: DashMap<SessionHandle, Session>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    /// Start a flow, replacing any session already open for `handle`.
    pub fn begin(&self, handle: &SessionHandle, flow: Flow) {
        debug!(session = %handle, phase = ?flow.phase(), "Session started");
        self.sessions.insert(handle.clone(), Session::new(flow));
    }

    /// Remove and return the live session for `handle`.
    ///
    /// An expired session is discarded and reported as absent.
    pub fn take(&self, handle: &SessionHandle) -> Option<Session> {
        let (_, session) = self.sessions.remove(handle)?;
        if session.touched_at.elapsed() > self.idle_timeout {
            debug!(
                session = %handle,
                age_secs = session.age().as_secs(),
                "Session expired"
            );
            return None;
        }
        Some(session)
    }

    /// Store a session back after a turn, continuing with `flow`.
    pub fn resume(&self, handle: &SessionHandle, mut session: Session, flow: Flow) {
        session.flow = flow;
        session.touched_at = Instant::now();
        self.sessions.insert(handle.clone(), session);
    }

    /// End a session. Returns whether a live one existed.
    pub fn end(&self, handle: &SessionHandle) -> bool {
        self.take(handle).is_some()
    }

    /// Current phase for `handle`, if a live session exists.
    pub fn phase(&self, handle: &SessionHandle) -> Option<Phase> {
        self.sessions
            .get(handle)
            .filter(|s| s.touched_at.elapsed() <= self.idle_timeout)
            .and_then(|s| s.phase())
    }

    /// Drop every idle session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|handle, session| {
            let live = session.touched_at.elapsed() <= self.idle_timeout;
            if !live {
                debug!(session = %handle, age_secs = session.age().as_secs(), "Session expired");
            }
            live
        });
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, "Expired sessions purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
