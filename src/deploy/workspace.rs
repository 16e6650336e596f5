use super::DeploymentError;
use crate::auth::AccessToken;
use crate::config::EnvironmentConfig;
use crate::fabric::{display_names_match, FabricApi, Workspace};

pub struct WorkspaceResolver<'a> {
    api: &'a dyn FabricApi,
}

impl<'a> WorkspaceResolver<'a> {
    pub fn new(api: &'a dyn FabricApi) -> Self {
        Self { api }
    }

    pub fn resolve_workspace_id(
        &self,
        token: &AccessToken,
        environment: &EnvironmentConfig,
    ) -> Result<String, DeploymentError> {
        if let Some(id) = environment
            .workspace_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(id.to_string());
        }
        let name = environment
            .workspace_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DeploymentError::WorkspaceNotFound {
                name: String::new(),
            })?;
        self.resolve_by_name(token, name)
    }

    pub fn resolve_by_name(
        &self,
        token: &AccessToken,
        name: &str,
    ) -> Result<String, DeploymentError> {
        let workspaces = self.api.list_workspaces(token).map_err(|err| {
            if err.is_auth_failure() {
                DeploymentError::AccessDenied {
                    workspace_id: name.to_string(),
                    body: err.to_string(),
                }
            } else {
                DeploymentError::WorkspaceUnavailable {
                    workspace_id: name.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;
        workspaces
            .into_iter()
            .find(|workspace| display_names_match(&workspace.display_name, name))
            .map(|workspace| workspace.id)
            .ok_or_else(|| DeploymentError::WorkspaceNotFound {
                name: name.to_string(),
            })
    }

    pub fn verify_access(
        &self,
        token: &AccessToken,
        workspace_id: &str,
    ) -> Result<Workspace, DeploymentError> {
        self.api
            .get_workspace(token, workspace_id)
            .map_err(|err| {
                if err.is_auth_failure() {
                    DeploymentError::AccessDenied {
                        workspace_id: workspace_id.to_string(),
                        body: err.body().unwrap_or_default().to_string(),
                    }
                } else {
                    DeploymentError::WorkspaceUnavailable {
                        workspace_id: workspace_id.to_string(),
                        reason: err.to_string(),
                    }
                }
            })
    }
}
