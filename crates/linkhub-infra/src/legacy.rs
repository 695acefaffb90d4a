//! Import of the legacy single-file registry (`projects.json`).
//!
//! The legacy file maps edit keys to flat entries. Older entries carry a
//! single `logo_name`/`logo_data` pair instead of per-slot logos; that logo
//! is copied into all three slots. Entries without any logo cannot be
//! republished and are skipped.
//!
//! Logo filenames are rebuilt from the decoded content (`logo{slot}.{ext}`)
//! because legacy entries reused one name for different images.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use linkhub_core::link::normalize_link;
use linkhub_core::registry::{ProjectRegistry, ProjectStore};
use linkhub_types::error::RegistryError;
use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::{LogoImage, LogoSlot};
use linkhub_types::project::{NewProject, ProjectId, ProjectKey, ProjectRecord};

#[derive(Debug, Error)]
pub enum LegacyImportError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    project: String,
    title: String,
    link1: String,
    link2: String,
    link3: String,
    #[serde(default)]
    logo1_data: Option<String>,
    #[serde(default)]
    logo2_data: Option<String>,
    #[serde(default)]
    logo3_data: Option<String>,
    #[serde(default)]
    logo_data: Option<String>,
}

/// An entry that was not imported, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<ProjectKey>,
    pub skipped: Vec<SkippedEntry>,
}

/// Import every usable entry of a legacy registry file.
///
/// Entries already present in the registry are skipped, so re-running an
/// import is harmless. Storage failures abort the import.
pub async fn import_legacy<S: ProjectStore>(
    registry: &ProjectRegistry<S>,
    path: &Path,
) -> Result<ImportReport, LegacyImportError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LegacyImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let entries: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&content).map_err(|source| LegacyImportError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut report = ImportReport::default();
    for (key, value) in entries {
        let record = match convert(&key, value) {
            Ok(record) => record,
            Err(reason) => {
                warn!(key = %key, reason = %reason, "Skipping legacy entry");
                report.skipped.push(SkippedEntry { key, reason });
                continue;
            }
        };

        match registry.insert(record).await {
            Ok(record) => report.imported.push(record.key),
            Err(RegistryError::Conflict(_)) => {
                report.skipped.push(SkippedEntry {
                    key,
                    reason: "already registered".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "Legacy import finished"
    );
    Ok(report)
}

fn convert(key: &str, value: serde_json::Value) -> Result<ProjectRecord, String> {
    let key = ProjectKey::parse(key).ok_or_else(|| "unusable edit key".to_string())?;
    let entry: LegacyEntry =
        serde_json::from_value(value).map_err(|e| format!("malformed entry: {e}"))?;

    let title = entry.title.trim().to_string();
    if title.is_empty() {
        return Err("empty title".to_string());
    }

    let links = [
        legacy_link(&entry.link1)?,
        legacy_link(&entry.link2)?,
        legacy_link(&entry.link3)?,
    ];

    let primary = entry
        .logo1_data
        .as_deref()
        .or(entry.logo_data.as_deref())
        .ok_or_else(|| "no logo".to_string())?;
    let primary = decode_logo(primary)?;
    let slot1 = LogoSlot::for_slot(1, &primary);

    let secondary = |slot: usize, data: Option<&str>| -> Result<LogoSlot, String> {
        let Some(data) = data else {
            return Ok(slot1.clone());
        };
        let image = decode_logo(data)?;
        if image.bytes() == primary.bytes() {
            Ok(slot1.clone())
        } else {
            Ok(LogoSlot::for_slot(slot, &image))
        }
    };
    let logos = [
        slot1.clone(),
        secondary(2, entry.logo2_data.as_deref())?,
        secondary(3, entry.logo3_data.as_deref())?,
    ];

    let mut record = ProjectRecord::from_new(
        key,
        NewProject {
            project_id: ProjectId::new(entry.project),
            title,
            links,
            logos,
        },
    );
    record.updated_at = None;
    Ok(record)
}

fn legacy_link(raw: &str) -> Result<CanonicalLink, String> {
    normalize_link(raw).map_err(|_| format!("not a Telegram link: '{raw}'"))
}

fn decode_logo(data: &str) -> Result<LogoImage, String> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| format!("invalid logo data: {e}"))?;
    LogoImage::from_bytes(bytes).ok_or_else(|| "logo is not a supported image".to_string())
}
