use crate::fabric::Part;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStep {
    VerifyWorkspaceAccess,
    ValidateBundle,
    PublishModel,
    WaitModel,
    BindConnection,
    PublishReport,
    WaitReport,
    VerifyFinalState,
}

impl DeploymentStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyWorkspaceAccess => "verify_workspace_access",
            Self::ValidateBundle => "validate_bundle",
            Self::PublishModel => "publish_model",
            Self::WaitModel => "wait_model",
            Self::BindConnection => "bind_connection",
            Self::PublishReport => "publish_report",
            Self::WaitReport => "wait_report",
            Self::VerifyFinalState => "verify_final_state",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::VerifyWorkspaceAccess => Some(Self::ValidateBundle),
            Self::ValidateBundle => Some(Self::PublishModel),
            Self::PublishModel => Some(Self::WaitModel),
            Self::WaitModel => Some(Self::BindConnection),
            Self::BindConnection => Some(Self::PublishReport),
            Self::PublishReport => Some(Self::WaitReport),
            Self::WaitReport => Some(Self::VerifyFinalState),
            Self::VerifyFinalState => None,
        }
    }
}

impl std::fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub bundle_base_name: String,
    pub success: bool,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub failed_step: Option<DeploymentStep>,
    #[serde(default)]
    pub model_digest: Option<String>,
    #[serde(default)]
    pub report_digest: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentResult {
    pub fn started(bundle_base_name: &str) -> Self {
        Self {
            bundle_base_name: bundle_base_name.to_string(),
            success: false,
            model_id: None,
            report_id: None,
            warnings: Vec::new(),
            error_message: None,
            failed_step: None,
            model_digest: None,
            report_digest: None,
            timestamp: Utc::now(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.success {
            "SUCCESS"
        } else {
            "FAILED"
        }
    }

    pub fn status_line(&self) -> String {
        let mut line = format!("[{}] {}", self.status_label(), self.bundle_base_name);
        if let Some(step) = self.failed_step {
            let _ = write!(line, " at {step}");
        }
        if let Some(message) = &self.error_message {
            let _ = write!(line, ": {message}");
        }
        if !self.warnings.is_empty() {
            let _ = write!(line, " ({} warning(s))", self.warnings.len());
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub bundle_base_name: String,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub environment: String,
    pub workspace_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_count: usize,
    pub success_count: usize,
    pub failure_details: Vec<FailureDetail>,
    pub results: Vec<DeploymentResult>,
}

impl RunSummary {
    pub fn from_results(
        run_id: &str,
        environment: &str,
        workspace_id: &str,
        started_at: DateTime<Utc>,
        results: Vec<DeploymentResult>,
    ) -> Self {
        let failure_details = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| FailureDetail {
                bundle_base_name: result.bundle_base_name.clone(),
                error_message: result.error_message.clone().unwrap_or_default(),
            })
            .collect();
        Self {
            run_id: run_id.to_string(),
            environment: environment.to_string(),
            workspace_id: workspace_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            total_count: results.len(),
            success_count: results.iter().filter(|result| result.success).count(),
            failure_details,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.success_count == self.total_count
    }

    pub fn failed_bundles(&self) -> Vec<&str> {
        self.failure_details
            .iter()
            .map(|detail| detail.bundle_base_name.as_str())
            .collect()
    }

    pub fn render_table(&self) -> String {
        let name_width = self
            .results
            .iter()
            .map(|result| result.bundle_base_name.len())
            .chain(std::iter::once("bundle".len()))
            .max()
            .unwrap_or_default();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "run {} environment={} workspace={}",
            self.run_id, self.environment, self.workspace_id
        );
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<7}  {:<36}  {:<36}  warnings",
            "bundle", "status", "model_id", "report_id"
        );
        for result in &self.results {
            let _ = writeln!(
                out,
                "{:<name_width$}  {:<7}  {:<36}  {:<36}  {}",
                result.bundle_base_name,
                result.status_label(),
                result.model_id.as_deref().unwrap_or("-"),
                result.report_id.as_deref().unwrap_or("-"),
                result.warnings.len()
            );
        }
        let _ = write!(
            out,
            "{}/{} bundle(s) deployed",
            self.success_count, self.total_count
        );
        if !self.failure_details.is_empty() {
            let _ = write!(out, "; failed: {}", self.failed_bundles().join(", "));
        }
        out
    }
}

pub fn fingerprint_parts(parts: &[Part]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.path.as_bytes());
        hasher.update([0]);
        hasher.update(&part.payload);
        hasher.update([0]);
    }
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
