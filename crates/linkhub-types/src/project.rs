//! Persistent project records.
//!
//! A `ProjectRecord` is everything needed to republish a hub page without
//! asking the user again: the hosting project id, title, three canonical
//! links, and three logo files. Records are keyed by an opaque edit key,
//! the only credential required to change them later.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::link::{CanonicalLink, LinkField};
use crate::logo::LogoSlot;

/// Length of a freshly minted edit key (hex characters).
pub const KEY_LENGTH: usize = 16;

/// Opaque edit key identifying one project record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Mint a new random key: the first 16 hex digits of a v4 UUID.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..KEY_LENGTH].to_string())
    }

    /// Parse user input into a key.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, which keeps keys
    /// safe to use as storage file names. Returns `None` for anything else.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= 64
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hosting-platform project name. Stable for the lifetime of a record so
/// every redeploy overwrites the same site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Random project slug: `<prefix>-<6 hex>`.
    pub fn generate(prefix: &str) -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &hex[..6]))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input to `ProjectRegistry::create`: a record without key or revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub project_id: ProjectId,
    pub title: String,
    pub links: [CanonicalLink; 3],
    pub logos: [LogoSlot; 3],
}

/// A completed, published hub page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredProjectRecord", into = "StoredProjectRecord")]
pub struct ProjectRecord {
    pub key: ProjectKey,
    pub project_id: ProjectId,
    pub title: String,
    pub links: [CanonicalLink; 3],
    pub logos: [LogoSlot; 3],
    /// Optimistic concurrency token, bumped on every write.
    pub revision: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProjectRecord {
    /// Assemble a first-revision record from creation input.
    pub fn from_new(key: ProjectKey, new: NewProject) -> Self {
        Self {
            key,
            project_id: new.project_id,
            title: new.title,
            links: new.links,
            logos: new.logos,
            revision: 0,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn link(&self, field: LinkField) -> &CanonicalLink {
        &self.links[field.index()]
    }

    pub fn set_link(&mut self, field: LinkField, link: CanonicalLink) {
        self.links[field.index()] = link;
    }
}

/// On-disk shape. Field names follow the registry file format the bot has
/// always written (`project`, `logo1_name`, `logo1_data`, ...).
#[derive(Serialize, Deserialize)]
struct StoredProjectRecord {
    key: ProjectKey,
    project: ProjectId,
    title: String,
    link1: CanonicalLink,
    link2: CanonicalLink,
    link3: CanonicalLink,
    logo1_name: String,
    logo2_name: String,
    logo3_name: String,
    logo1_data: String,
    logo2_data: String,
    logo3_data: String,
    #[serde(default)]
    revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoredProjectRecord> for ProjectRecord {
    type Error = String;

    fn try_from(stored: StoredProjectRecord) -> Result<Self, Self::Error> {
        let decode = |name: String, data: &str| -> Result<LogoSlot, String> {
            if name.is_empty() {
                return Err("logo filename is empty".to_string());
            }
            let bytes = STANDARD
                .decode(data)
                .map_err(|e| format!("invalid base64 for {name}: {e}"))?;
            Ok(LogoSlot {
                filename: name,
                bytes,
            })
        };

        let logos = [
            decode(stored.logo1_name, &stored.logo1_data)?,
            decode(stored.logo2_name, &stored.logo2_data)?,
            decode(stored.logo3_name, &stored.logo3_data)?,
        ];

        Ok(Self {
            key: stored.key,
            project_id: stored.project,
            title: stored.title,
            links: [stored.link1, stored.link2, stored.link3],
            logos,
            revision: stored.revision,
            updated_at: stored.updated_at,
        })
    }
}

impl From<ProjectRecord> for StoredProjectRecord {
    fn from(record: ProjectRecord) -> Self {
        let [link1, link2, link3] = record.links;
        let [logo1, logo2, logo3] = record.logos;
        Self {
            key: record.key,
            project: record.project_id,
            title: record.title,
            link1,
            link2,
            link3,
            logo1_data: STANDARD.encode(&logo1.bytes),
            logo2_data: STANDARD.encode(&logo2.bytes),
            logo3_data: STANDARD.encode(&logo3.bytes),
            logo1_name: logo1.filename,
            logo2_name: logo2.filename,
            logo3_name: logo3.filename,
            revision: record.revision,
            updated_at: record.updated_at,
        }
    }
}
