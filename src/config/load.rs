use super::{ConfigError, DeployConfig};
use std::path::Path;

pub const TENANT_ID_ENV: &str = "FABRIC_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "FABRIC_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "FABRIC_CLIENT_SECRET";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_deploy_config(path: &Path) -> Result<DeployConfig, ConfigError> {
    load_deploy_config_with_env(path, non_empty_env)
}

pub fn load_deploy_config_with_env<F>(path: &Path, lookup: F) -> Result<DeployConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = DeployConfig::from_path(path)?;
    apply_env_overrides(&mut config, lookup);
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.resolve_relative_paths(base_dir);
    config.validate()?;
    Ok(config)
}

pub fn apply_env_overrides<F>(config: &mut DeployConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(TENANT_ID_ENV) {
        config.tenant_id = value;
    }
    if let Some(value) = lookup(CLIENT_ID_ENV) {
        config.client_id = value;
    }
    if let Some(value) = lookup(CLIENT_SECRET_ENV) {
        config.client_secret = Some(value);
    }
}

impl DeployConfig {
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let tenant_id = required(&self.tenant_id, "tenant_id", TENANT_ID_ENV)?;
        let client_id = required(&self.client_id, "client_id", CLIENT_ID_ENV)?;
        let client_secret = required(
            self.client_secret.as_deref().unwrap_or_default(),
            "client_secret",
            CLIENT_SECRET_ENV,
        )?;
        Ok(Credentials {
            tenant_id,
            client_id,
            client_secret,
        })
    }
}

fn required(value: &str, field: &'static str, env_key: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingCredential { field, env_key });
    }
    Ok(trimmed.to_string())
}
