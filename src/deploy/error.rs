use crate::artifacts::ArtifactError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::fabric::{ApiError, ItemKind};

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error("workspace `{name}` not found")]
    WorkspaceNotFound { name: String },
    #[error("access denied to workspace `{workspace_id}`: {body}")]
    AccessDenied { workspace_id: String, body: String },
    #[error("workspace `{workspace_id}` is unavailable: {reason}")]
    WorkspaceUnavailable {
        workspace_id: String,
        reason: String,
    },
    #[error("bundle `{base_name}` is invalid: {reason}")]
    InvalidBundle { base_name: String, reason: String },
    #[error("failed to publish {item}: {body}")]
    Publish { item: String, body: String },
    #[error("{kind} `{item}` did not appear within {waited_seconds}s")]
    PollTimeout {
        item: String,
        kind: ItemKind,
        waited_seconds: u64,
    },
    #[error("final verification failed for `{item}`: {reason}")]
    VerificationFailed { item: String, reason: String },
    #[error("artifact discovery failed: {0}")]
    Discovery(#[from] ArtifactError),
    #[error("no artifact bundles found under {roots}")]
    NoBundles { roots: String },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DeploymentError {
    pub fn publish(kind: ItemKind, display_name: &str, err: &ApiError) -> Self {
        Self::Publish {
            item: format!("{kind} `{display_name}`"),
            body: err.to_string(),
        }
    }

    pub fn invalid_bundle(base_name: &str, err: ArtifactError) -> Self {
        let reason = match err {
            ArtifactError::InvalidBundle { reason, .. } => reason,
            other => other.to_string(),
        };
        Self::InvalidBundle {
            base_name: base_name.to_string(),
            reason,
        }
    }

    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::WorkspaceNotFound { .. }
                | Self::AccessDenied { .. }
                | Self::WorkspaceUnavailable { .. }
                | Self::Discovery(_)
                | Self::NoBundles { .. }
                | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_errors_are_fatal_and_bundle_errors_are_not() {
        assert!(DeploymentError::WorkspaceNotFound {
            name: "Sales Dev".to_string()
        }
        .is_fatal_for_run());
        assert!(DeploymentError::NoBundles {
            roots: "./artifacts".to_string()
        }
        .is_fatal_for_run());
        assert!(!DeploymentError::InvalidBundle {
            base_name: "Marketing".to_string(),
            reason: "report folder missing".to_string()
        }
        .is_fatal_for_run());
        assert!(!DeploymentError::Publish {
            item: "Report `Sales`".to_string(),
            body: "boom".to_string()
        }
        .is_fatal_for_run());
    }

    #[test]
    fn publish_error_keeps_raw_body() {
        let api = ApiError::Status {
            method: "POST".to_string(),
            url: "https://api.example.com/v1/workspaces/ws/semanticModels".to_string(),
            status: 400,
            body: r#"{"errorCode":"InvalidDefinition"}"#.to_string(),
        };
        let err = DeploymentError::publish(ItemKind::SemanticModel, "Sales", &api);
        let text = err.to_string();
        assert!(text.contains("SemanticModel `Sales`"));
        assert!(text.contains(r#"{"errorCode":"InvalidDefinition"}"#));
    }
}
