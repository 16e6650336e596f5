use crate::auth::AccessToken;
use crate::config::{ConnectionTarget, DeploymentOptions};
use crate::shared::DeployLog;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub token: AccessToken,
    pub workspace_id: String,
    pub environment: String,
    pub target: ConnectionTarget,
    pub connection_name: Option<String>,
    pub options: DeploymentOptions,
    pub log: DeployLog,
    pub sleep: fn(Duration),
}

impl DeploymentContext {
    pub fn new(
        token: AccessToken,
        workspace_id: impl Into<String>,
        environment: impl Into<String>,
        target: ConnectionTarget,
        options: DeploymentOptions,
    ) -> Self {
        Self {
            token,
            workspace_id: workspace_id.into(),
            environment: environment.into(),
            target,
            connection_name: None,
            options,
            log: DeployLog::silent(),
            sleep: std::thread::sleep,
        }
    }

    pub fn with_connection_name(mut self, connection_name: Option<String>) -> Self {
        self.connection_name = connection_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }

    pub fn with_log(mut self, log: DeployLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn poll_max_wait(&self) -> Duration {
        Duration::from_secs(self.options.poll_max_wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.options.poll_interval_seconds)
    }
}
