//! VercelDeployer -- concrete [`SiteDeployer`] for the Vercel deployments API.
//!
//! Every deployment uploads the complete bundle inline (base64 file
//! entries) as a production deployment of a named project. Re-deploying
//! under the same project name replaces the live site.
//!
//! The API token is wrapped in [`SecretString`] and only exposed when
//! building the authorization header.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use linkhub_core::deploy::{Deployment, DeploymentBundle, SiteDeployer};
use linkhub_types::config::HostingConfig;
use linkhub_types::error::DeployError;
use linkhub_types::project::ProjectId;

use crate::http::build_client;

const DEPLOYMENTS_PATH: &str = "/v13/deployments";

/// Uploads can be slow for bundles with several logos.
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct DeploymentRequest<'a> {
    name: &'a str,
    files: Vec<InlineFile<'a>>,
    #[serde(rename = "projectSettings")]
    project_settings: ProjectSettings,
    target: &'static str,
}

#[derive(Serialize)]
struct InlineFile<'a> {
    file: &'a str,
    data: String,
    encoding: &'static str,
}

/// Static site: every framework/build setting explicitly null.
#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProjectSettings {
    framework: Option<String>,
    root_directory: Option<String>,
    output_directory: Option<String>,
    install_command: Option<String>,
    build_command: Option<String>,
    dev_command: Option<String>,
}

#[derive(Deserialize)]
struct DeploymentResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Deploys hub pages to Vercel.
pub struct VercelDeployer {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
    team_id: Option<String>,
    project_prefix: String,
    domain_suffix: String,
}

impl VercelDeployer {
    pub fn new(token: SecretString, config: &HostingConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(DEPLOY_TIMEOUT, concat!("linkhub/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            team_id: config.team_id.clone().filter(|t| !t.is_empty()),
            project_prefix: config.project_prefix.clone(),
            domain_suffix: config.domain_suffix.clone(),
        })
    }

    fn public_url(&self, project: &ProjectId) -> String {
        format!("https://{project}.{}", self.domain_suffix)
    }
}

impl SiteDeployer for VercelDeployer {
    async fn deploy(
        &self,
        bundle: &DeploymentBundle,
        project: Option<&ProjectId>,
    ) -> Result<Deployment, DeployError> {
        let project_id = project
            .cloned()
            .unwrap_or_else(|| ProjectId::generate(&self.project_prefix));

        let body = DeploymentRequest {
            name: project_id.as_str(),
            files: bundle
                .files()
                .iter()
                .map(|f| InlineFile {
                    file: &f.name,
                    data: STANDARD.encode(&f.bytes),
                    encoding: "base64",
                })
                .collect(),
            project_settings: ProjectSettings::default(),
            target: "production",
        };

        let mut request = self
            .client
            .post(format!("{}{DEPLOYMENTS_PATH}", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .json(&body);
        if let Some(team_id) = &self.team_id {
            request = request.query(&[("teamId", team_id)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeployError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                project = %project_id,
                status = status.as_u16(),
                body = %body,
                "Vercel rejected deployment"
            );
            return Err(DeployError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DeploymentResponse = response
            .json()
            .await
            .map_err(|e| DeployError::InvalidResponse(e.to_string()))?;
        debug!(
            project = %project_id,
            deployment = parsed.id.as_deref().unwrap_or("-"),
            "Vercel accepted deployment"
        );

        Ok(Deployment {
            url: self.public_url(&project_id),
            project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhub_core::render::RenderedSite;
    use linkhub_types::logo::LogoSlot;
    use mockito::Matcher;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn bundle() -> DeploymentBundle {
        let logo = LogoSlot {
            filename: "logo1.png".to_string(),
            bytes: PNG.to_vec(),
        };
        DeploymentBundle::new(
            RenderedSite {
                markup: "<h1>Hub</h1>".to_string(),
                stylesheet: "h1 {}".to_string(),
            },
            &[logo.clone(), logo.clone(), logo],
        )
    }

    fn deployer(server: &mockito::Server, team_id: Option<&str>) -> VercelDeployer {
        let config = HostingConfig {
            api_base: server.url(),
            team_id: team_id.map(str::to_string),
            ..HostingConfig::default()
        };
        VercelDeployer::new(SecretString::from("vercel-token".to_string()), &config).unwrap()
    }

    #[tokio::test]
    async fn test_new_project_deploy_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v13/deployments")
            .match_header("authorization", "Bearer vercel-token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "files": [
                    {"file": "index.html", "data": STANDARD.encode("<h1>Hub</h1>"), "encoding": "base64"},
                    {"file": "style.css", "data": STANDARD.encode("h1 {}"), "encoding": "base64"},
                    {"file": "logo1.png", "data": STANDARD.encode(PNG), "encoding": "base64"}
                ],
                "projectSettings": {
                    "framework": null,
                    "rootDirectory": null,
                    "outputDirectory": null,
                    "installCommand": null,
                    "buildCommand": null,
                    "devCommand": null
                },
                "target": "production"
            })))
            .with_status(200)
            .with_body(r#"{"id":"dpl_123","url":"multilink-abc.vercel.app"}"#)
            .create_async()
            .await;

        let deployment = deployer(&server, None).deploy(&bundle(), None).await.unwrap();

        mock.assert_async().await;
        assert!(deployment.project_id.as_str().starts_with("multilink-"));
        assert_eq!(
            deployment.url,
            format!("https://{}.vercel.app", deployment.project_id)
        );
    }

    #[tokio::test]
    async fn test_existing_project_and_team_scope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v13/deployments")
            .match_query(Matcher::UrlEncoded("teamId".into(), "team_1".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({"name": "multilink-a1b2c3"})))
            .with_body(r#"{"id":"dpl_456"}"#)
            .create_async()
            .await;

        let project = ProjectId::new("multilink-a1b2c3");
        let deployment = deployer(&server, Some("team_1"))
            .deploy(&bundle(), Some(&project))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(deployment.project_id, project);
        assert_eq!(deployment.url, "https://multilink-a1b2c3.vercel.app");
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v13/deployments")
            .with_status(500)
            .with_body(r#"{"error":{"code":"internal_server_error"}}"#)
            .create_async()
            .await;

        let err = deployer(&server, None)
            .deploy(&bundle(), None)
            .await
            .unwrap_err();

        match err {
            DeployError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("internal_server_error"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v13/deployments")
            .with_status(200)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let err = deployer(&server, None)
            .deploy(&bundle(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidResponse(_)));
    }
}
