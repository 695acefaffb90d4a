//! Canonical Telegram links and the editable link slots of a hub page.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Host every canonical link points at.
pub const LINK_HOST: &str = "t.me";

/// A validated link in its canonical `https://t.me/<handle>` form.
///
/// Construct through the link normalizer in `linkhub-core`; the only way in
/// from here is [`CanonicalLink::from_handle`], which trusts its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalLink(String);

impl CanonicalLink {
    /// Build the canonical link for an already-validated handle.
    pub fn from_handle(handle: &str) -> Self {
        Self(format!("https://{LINK_HOST}/{handle}"))
    }

    /// The handle portion (everything after the last `/`).
    pub fn handle(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three outbound link slots on a hub page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkField {
    Link1,
    Link2,
    Link3,
}

impl LinkField {
    pub const ALL: [LinkField; 3] = [LinkField::Link1, LinkField::Link2, LinkField::Link3];

    /// Zero-based slot index.
    pub fn index(self) -> usize {
        match self {
            LinkField::Link1 => 0,
            LinkField::Link2 => 1,
            LinkField::Link3 => 2,
        }
    }

    /// Human label used on the edit keyboard.
    pub fn label(self) -> &'static str {
        match self {
            LinkField::Link1 => "Main bot",
            LinkField::Link2 => "Backup bot",
            LinkField::Link3 => "Channel",
        }
    }
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkField::Link1 => write!(f, "link1"),
            LinkField::Link2 => write!(f, "link2"),
            LinkField::Link3 => write!(f, "link3"),
        }
    }
}

impl FromStr for LinkField {
    type Err = String;

    /// Accepts either the field name (`link2`) or the keyboard label
    /// (`Backup bot`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        LinkField::ALL
            .into_iter()
            .find(|field| field.to_string() == needle || field.label().to_lowercase() == needle)
            .ok_or_else(|| format!("unknown link field: '{}'", s.trim()))
    }
}
