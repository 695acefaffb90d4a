//! Site publishing: render, package, deploy.
//!
//! `SitePublisher` is the single publish path shared by the conversation
//! flows and the batch redeploy command.

use tracing::{error, info};

use linkhub_types::error::{DeployError, RegistryError};
use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::LogoSlot;
use linkhub_types::project::{ProjectId, ProjectKey, ProjectRecord};

use crate::deploy::{Deployment, DeploymentBundle, SiteDeployer};
use crate::registry::{ProjectRegistry, ProjectStore};
use crate::render::{SiteFields, Templates, render_site};

/// Outcome of redeploying one stored record.
#[derive(Debug)]
pub struct RedeployReport {
    pub key: ProjectKey,
    pub project_id: ProjectId,
    pub result: Result<String, DeployError>,
}

/// Renders hub pages from templates and publishes them.
pub struct SitePublisher<D: SiteDeployer> {
    templates: Templates,
    deployer: D,
}

impl<D: SiteDeployer> SitePublisher<D> {
    pub fn new(templates: Templates, deployer: D) -> Self {
        Self {
            templates,
            deployer,
        }
    }

    /// Access the underlying deployer.
    pub fn deployer(&self) -> &D {
        &self.deployer
    }

    /// Render and deploy a page. `project` is `None` for a brand-new site.
    pub async fn publish(
        &self,
        title: &str,
        links: &[CanonicalLink; 3],
        logos: &[LogoSlot; 3],
        project: Option<&ProjectId>,
    ) -> Result<Deployment, DeployError> {
        let fields = SiteFields::new(title, links, logos);
        let site = render_site(&self.templates, &fields);
        let bundle = DeploymentBundle::new(site, logos);

        let deployment = self.deployer.deploy(&bundle, project).await?;
        info!(
            project = %deployment.project_id,
            url = %deployment.url,
            files = bundle.files().len(),
            "Site published"
        );
        Ok(deployment)
    }

    /// Republish a stored record under its existing project id.
    pub async fn publish_record(&self, record: &ProjectRecord) -> Result<Deployment, DeployError> {
        self.publish(
            &record.title,
            &record.links,
            &record.logos,
            Some(&record.project_id),
        )
        .await
    }

    /// Re-render every stored record with the current templates and
    /// redeploy it in place.
    ///
    /// A failed deployment is recorded in its report and does not stop the
    /// batch. Only failing to read the registry aborts.
    pub async fn redeploy_all<S: ProjectStore>(
        &self,
        registry: &ProjectRegistry<S>,
    ) -> Result<Vec<RedeployReport>, RegistryError> {
        let collection = registry.load().await?;
        let mut reports = Vec::with_capacity(collection.len());

        for record in collection.into_values() {
            let result = self.publish_record(&record).await.map(|d| d.url);
            if let Err(e) = &result {
                error!(key = %record.key, project = %record.project_id, error = %e, "Redeploy failed");
            }
            reports.push(RedeployReport {
                key: record.key,
                project_id: record.project_id,
                result,
            });
        }

        Ok(reports)
    }
}
