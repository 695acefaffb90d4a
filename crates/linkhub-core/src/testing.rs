//! In-memory fakes for the port traits, shared by unit tests in this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use linkhub_types::error::{DeployError, RegistryError};
use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::{LogoImage, LogoSlot};
use linkhub_types::project::{NewProject, ProjectId, ProjectKey, ProjectRecord};

use crate::deploy::{Deployment, DeploymentBundle, MARKUP_FILE, SiteDeployer};
use crate::metadata::{MetadataOutcome, MetadataSource};
use crate::registry::ProjectStore;
use crate::render::Templates;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

pub fn png_logo() -> LogoImage {
    LogoImage::from_bytes(PNG.to_vec()).unwrap()
}

pub fn jpeg_logo() -> LogoImage {
    LogoImage::from_bytes(JPEG.to_vec()).unwrap()
}

pub fn test_templates() -> Templates {
    Templates {
        markup: "<h1>%%TITLE%%</h1><a href=\"%%LINK1%%\"><img src=\"%%LOGO1%%\"></a>\
                 <a href=\"%%LINK2%%\"><img src=\"%%LOGO2%%\"></a>\
                 <a href=\"%%LINK3%%\"><img src=\"%%LOGO3%%\"></a>"
            .to_string(),
        stylesheet: "header { background-image: url(%%LOGO%%); }".to_string(),
    }
}

pub fn sample_new_project() -> NewProject {
    let logo = LogoSlot::for_slot(1, &png_logo());
    NewProject {
        project_id: ProjectId::new("multilink-a1b2c3"),
        title: "News Hub".to_string(),
        links: [
            CanonicalLink::from_handle("main_bot"),
            CanonicalLink::from_handle("backup_bot"),
            CanonicalLink::from_handle("news_channel"),
        ],
        logos: [logo.clone(), LogoSlot::for_slot(2, &jpeg_logo()), logo],
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Returns a fixed outcome, optionally per handle, optionally after a delay.
pub struct StaticSource {
    default: MetadataOutcome,
    by_handle: HashMap<String, MetadataOutcome>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(default: MetadataOutcome) -> Self {
        Self {
            default,
            by_handle: HashMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_link(mut self, handle: &str, outcome: MetadataOutcome) -> Self {
        self.by_handle.insert(handle.to_string(), outcome);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetadataSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn lookup(&self, link: &CanonicalLink) -> MetadataOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.by_handle
            .get(link.handle())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProjectStore {
    records: Mutex<BTreeMap<ProjectKey, ProjectRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryProjectStore {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ProjectStore for InMemoryProjectStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, RegistryError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn put(
        &self,
        record: &ProjectRecord,
        expected_revision: Option<u64>,
    ) -> Result<(), RegistryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RegistryError::Storage("disk full".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let current = records.get(&record.key).map(|r| r.revision);
        if current != expected_revision {
            return Err(RegistryError::Conflict(format!(
                "{}: expected revision {expected_revision:?}, found {current:?}",
                record.key
            )));
        }
        records.insert(record.key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>, RegistryError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeployCall {
    pub project: Option<ProjectId>,
    pub file_names: Vec<String>,
    pub markup: String,
}

/// Records every deployment; can be told to reject the next one or to take
/// a while before answering.
#[derive(Default)]
pub struct RecordingDeployer {
    calls: Mutex<Vec<DeployCall>>,
    fail_next: Mutex<Option<u16>>,
    delay: Option<Duration>,
}

impl RecordingDeployer {
    /// Finish each deployment only after `delay`. Calls are recorded in
    /// completion order.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next(&self, status: u16) {
        *self.fail_next.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<DeployCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SiteDeployer for RecordingDeployer {
    async fn deploy(
        &self,
        bundle: &DeploymentBundle,
        project: Option<&ProjectId>,
    ) -> Result<Deployment, DeployError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let markup = bundle
            .files()
            .iter()
            .find(|f| f.name == MARKUP_FILE)
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned())
            .unwrap_or_default();

        self.calls.lock().unwrap().push(DeployCall {
            project: project.cloned(),
            file_names: bundle.file_names().iter().map(|s| s.to_string()).collect(),
            markup,
        });

        if let Some(status) = self.fail_next.lock().unwrap().take() {
            return Err(DeployError::Rejected {
                status,
                body: "{\"error\":{\"code\":\"internal_server_error\"}}".to_string(),
            });
        }

        let project_id = project.cloned().unwrap_or_else(|| ProjectId::generate("test"));
        Ok(Deployment {
            url: format!("https://{project_id}.test.app"),
            project_id,
        })
    }
}
