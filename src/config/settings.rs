use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const DEFAULT_FABRIC_BASE: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_POWERBI_BASE: &str = "https://api.powerbi.com/v1.0/myorg";
pub const DEFAULT_STATE_DIR: &str = ".fabric-deploy";
pub const BASE_NAME_PLACEHOLDER: &str = "{base}";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub artifact_roots: Vec<PathBuf>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub deployment: DeploymentOptions,
    #[serde(default)]
    pub api: ApiEndpoints,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub warehouse: ConnectionTarget,
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionTarget {
    #[serde(alias = "server")]
    pub server_endpoint: String,
    #[serde(alias = "database")]
    pub database_name: String,
}

impl ConnectionTarget {
    pub fn new(server_endpoint: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            server_endpoint: server_endpoint.into(),
            database_name: database_name.into(),
        }
    }

    pub fn connection_path(&self) -> String {
        format!("{};{}", self.server_endpoint, self.database_name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentOptions {
    #[serde(default = "default_candidate_folders")]
    pub candidate_folders: Vec<String>,
    #[serde(default = "default_name_template")]
    pub model_name_template: String,
    #[serde(default = "default_name_template")]
    pub report_name_template: String,
    #[serde(default)]
    pub refresh_after_publish: bool,
    #[serde(default)]
    pub write_back_definitions: bool,
    #[serde(default = "default_poll_max_wait_seconds")]
    pub poll_max_wait_seconds: u64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_operation_max_wait_seconds")]
    pub operation_max_wait_seconds: u64,
    #[serde(default = "default_connector_functions")]
    pub connector_functions: Vec<String>,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            candidate_folders: default_candidate_folders(),
            model_name_template: default_name_template(),
            report_name_template: default_name_template(),
            refresh_after_publish: false,
            write_back_definitions: false,
            poll_max_wait_seconds: default_poll_max_wait_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            operation_max_wait_seconds: default_operation_max_wait_seconds(),
            connector_functions: default_connector_functions(),
        }
    }
}

impl DeploymentOptions {
    pub fn model_display_name(&self, base_name: &str) -> String {
        self.model_name_template
            .replace(BASE_NAME_PLACEHOLDER, base_name)
    }

    pub fn report_display_name(&self, base_name: &str) -> String {
        self.report_name_template
            .replace(BASE_NAME_PLACEHOLDER, base_name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiEndpoints {
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_fabric_base")]
    pub fabric_base: String,
    #[serde(default = "default_powerbi_base")]
    pub powerbi_base: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            fabric_base: default_fabric_base(),
            powerbi_base: default_powerbi_base(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_candidate_folders() -> Vec<String> {
    vec![
        "PowerBI".to_string(),
        "Reports".to_string(),
        "Artifacts".to_string(),
    ]
}

fn default_name_template() -> String {
    BASE_NAME_PLACEHOLDER.to_string()
}

fn default_poll_max_wait_seconds() -> u64 {
    300
}

fn default_poll_interval_seconds() -> u64 {
    15
}

fn default_operation_max_wait_seconds() -> u64 {
    600
}

fn default_connector_functions() -> Vec<String> {
    vec!["Sql.Database".to_string(), "Connect".to_string()]
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_fabric_base() -> String {
    DEFAULT_FABRIC_BASE.to_string()
}

fn default_powerbi_base() -> String {
    DEFAULT_POWERBI_BASE.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    120
}

impl DeployConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn resolve_relative_paths(&mut self, base_dir: &Path) {
        for root in &mut self.artifact_roots {
            if root.is_relative() {
                *root = base_dir.join(&*root);
            }
        }
        let state_dir = self
            .state_dir
            .take()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
        self.state_dir = Some(if state_dir.is_relative() {
            base_dir.join(state_dir)
        } else {
            state_dir
        });
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
    }

    pub fn environment(&self, label: &str) -> Result<(&str, &EnvironmentConfig), ConfigError> {
        let wanted = label.trim();
        self.environments
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
            .map(|(name, env)| (name.as_str(), env))
            .ok_or_else(|| ConfigError::UnknownEnvironment(wanted.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::Invalid("`tenant_id` must be non-empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("`client_id` must be non-empty".to_string()));
        }
        if self
            .client_secret
            .as_deref()
            .map_or(true, |secret| secret.trim().is_empty())
        {
            return Err(ConfigError::MissingCredential {
                field: "client_secret",
                env_key: super::load::CLIENT_SECRET_ENV,
            });
        }
        if self.artifact_roots.is_empty() {
            return Err(ConfigError::Invalid(
                "`artifact_roots` must list at least one directory".to_string(),
            ));
        }
        if self.environments.is_empty() {
            return Err(ConfigError::Invalid(
                "`environments` must define at least one environment".to_string(),
            ));
        }
        for (name, env) in &self.environments {
            let has_id = env
                .workspace_id
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty());
            let has_name = env
                .workspace_name
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty());
            if !has_id && !has_name {
                return Err(ConfigError::Invalid(format!(
                    "environment `{name}` needs `workspace_id` or `workspace_name`"
                )));
            }
            if env.warehouse.server_endpoint.trim().is_empty()
                || env.warehouse.database_name.trim().is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "environment `{name}` warehouse server and database must be non-empty"
                )));
            }
        }

        let options = &self.deployment;
        if options.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "`deployment.poll_interval_seconds` must be greater than zero".to_string(),
            ));
        }
        for (field, template) in [
            ("model_name_template", &options.model_name_template),
            ("report_name_template", &options.report_name_template),
        ] {
            if !template.contains(BASE_NAME_PLACEHOLDER) {
                return Err(ConfigError::Invalid(format!(
                    "`deployment.{field}` must contain `{BASE_NAME_PLACEHOLDER}`"
                )));
            }
        }
        if options
            .connector_functions
            .iter()
            .all(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "`deployment.connector_functions` must name at least one function".to_string(),
            ));
        }
        Ok(())
    }
}
