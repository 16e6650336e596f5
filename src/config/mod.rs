pub mod error;
pub mod load;
pub mod settings;

pub use error::ConfigError;
pub use load::{
    apply_env_overrides, load_deploy_config, load_deploy_config_with_env, Credentials,
    CLIENT_ID_ENV, CLIENT_SECRET_ENV, TENANT_ID_ENV,
};
pub use settings::{
    ApiEndpoints, ConnectionTarget, DeployConfig, DeploymentOptions, EnvironmentConfig,
    BASE_NAME_PLACEHOLDER, DEFAULT_AUTHORITY, DEFAULT_FABRIC_BASE, DEFAULT_POWERBI_BASE,
    DEFAULT_STATE_DIR,
};
