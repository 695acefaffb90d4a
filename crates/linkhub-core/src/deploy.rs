//! Deployment port.
//!
//! Defines the bundle of files that makes up a published hub page and the
//! `SiteDeployer` trait the hosting adapter implements.

use std::future::Future;

use linkhub_types::error::DeployError;
use linkhub_types::logo::LogoSlot;
use linkhub_types::project::ProjectId;

use crate::render::RenderedSite;

pub const MARKUP_FILE: &str = "index.html";
pub const STYLESHEET_FILE: &str = "style.css";

/// One file in a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Every file of one hub page: markup, stylesheet, and logo files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentBundle {
    files: Vec<BundleFile>,
}

impl DeploymentBundle {
    /// Package rendered assets and logos.
    ///
    /// Logo slots that share a filename (a slot reusing the slot-1 logo)
    /// contribute a single file; the first occurrence wins.
    pub fn new(site: RenderedSite, logos: &[LogoSlot]) -> Self {
        let mut files = vec![
            BundleFile {
                name: MARKUP_FILE.to_string(),
                bytes: site.markup.into_bytes(),
            },
            BundleFile {
                name: STYLESHEET_FILE.to_string(),
                bytes: site.stylesheet.into_bytes(),
            },
        ];

        for logo in logos {
            if files.iter().any(|f| f.name == logo.filename) {
                continue;
            }
            files.push(BundleFile {
                name: logo.filename.clone(),
                bytes: logo.bytes.clone(),
            });
        }

        Self { files }
    }

    pub fn files(&self) -> &[BundleFile] {
        &self.files
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

/// A completed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Public URL of the site.
    pub url: String,
    /// Project the bundle was published under.
    pub project_id: ProjectId,
}

/// Publishes bundles to the hosting platform.
///
/// Deploying to an existing project id replaces that project's production
/// content rather than creating a second site. When `project` is `None`,
/// the implementation picks a fresh random project id.
pub trait SiteDeployer: Send + Sync {
    fn deploy(
        &self,
        bundle: &DeploymentBundle,
        project: Option<&ProjectId>,
    ) -> impl Future<Output = Result<Deployment, DeployError>> + Send;
}
